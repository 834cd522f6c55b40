//! Typed resource state

use enos_transport::TransportConfig;
use enos_wire::{AttributePath, TfString, Value, WireObject};

use crate::error::CoreError;

/// A resource's full attribute set
///
/// `Clone` must be a deep copy; every lifecycle phase decodes its own states.
pub trait State: WireObject + Clone + Default + PartialEq + Send + Sync + 'static {
    /// Identity, unknown until the resource is created
    fn id(&self) -> &TfString;

    /// Mutable identity
    fn id_mut(&mut self) -> &mut TfString;

    /// The resource's transport block
    fn transport(&self) -> &TransportConfig;

    /// Mark every computed output except `id` as not yet known
    fn mark_outputs_unknown(&mut self);

    /// Copy computed outputs except `id` from `prior`
    fn carry_outputs(&mut self, prior: &Self);
}

/// Decode a state from the root of `value`; `None` for a null value
///
/// # Errors
/// Returns `CoreError::Decode` if the value does not match the state
pub fn decode_state<S: State>(value: &Value) -> Result<Option<S>, CoreError> {
    if value.is_null() {
        return Ok(None);
    }
    Ok(Some(S::decode(value, &AttributePath::root())?))
}

/// Encode an optional state; `None` encodes as null
#[must_use]
pub fn encode_state<S: State>(state: Option<&S>) -> Value {
    state.map_or(Value::Null, WireObject::encode)
}
