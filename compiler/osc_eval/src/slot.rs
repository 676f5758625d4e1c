//! Value slots and member attributes.

use bitflags::bitflags;

use crate::Value;

bitflags! {
    /// Declaration attributes of a member.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Attributes: u8 {
        const PRIVATE = 1;
        const PROTECTED = 1 << 1;
        const PUBLIC = 1 << 2;
        /// Assignable exactly once.
        const CONST = 1 << 3;
        const STATIC = 1 << 4;
    }
}

impl Attributes {
    /// Whether code outside the declaring scope may see the member.
    #[inline]
    pub fn is_public(self) -> bool {
        self.contains(Attributes::PUBLIC)
    }
}

/// Why [`Slot::assign`] refused a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignError {
    /// Constant already holds its one value.
    Const,
    /// `undefined` cannot be stored.
    Undefined,
}

/// One member's storage.
///
/// A slot with no attributes is undeclared: it may hold a stale default but
/// is invisible to lookup. Declaring resets the value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Slot {
    attrs: Option<Attributes>,
    value: Value,
    sealed: bool,
}

impl Slot {
    /// A public slot already holding `value` (a pushed argument).
    pub fn with_value(value: Value) -> Self {
        Slot {
            attrs: Some(Attributes::PUBLIC),
            value,
            sealed: false,
        }
    }

    /// (Re)declare with `attrs`, clearing any previous value.
    pub fn declare(&mut self, attrs: Attributes) {
        self.attrs = Some(attrs);
        self.value = Value::Undefined;
        self.sealed = false;
    }

    /// Store a value, enforcing write-once for constants.
    pub fn assign(&mut self, value: Value) -> Result<(), AssignError> {
        if value.is_undefined() {
            return Err(AssignError::Undefined);
        }
        if self.attrs.is_some_and(|a| a.contains(Attributes::CONST)) {
            if self.sealed {
                return Err(AssignError::Const);
            }
            self.sealed = true;
        }
        self.value = value;
        Ok(())
    }

    /// Return to the undeclared state, dropping the value.
    pub fn clear(&mut self) {
        *self = Slot::default();
    }

    #[inline]
    pub fn attributes(&self) -> Option<Attributes> {
        self.attrs
    }

    #[inline]
    pub fn is_declared(&self) -> bool {
        self.attrs.is_some()
    }

    /// Declared and public.
    #[inline]
    pub fn is_public(&self) -> bool {
        self.attrs.is_some_and(Attributes::is_public)
    }

    #[inline]
    pub fn is_const(&self) -> bool {
        self.attrs.is_some_and(|a| a.contains(Attributes::CONST))
    }

    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_is_undeclared() {
        let slot = Slot::default();
        assert!(!slot.is_declared());
        assert_eq!(slot.value(), &Value::Undefined);
    }

    #[test]
    fn test_declare_resets_value() {
        let mut slot = Slot::with_value(Value::int(3));
        slot.declare(Attributes::PRIVATE);
        assert_eq!(slot.value(), &Value::Undefined);
        assert!(slot.is_declared());
        assert!(!slot.is_public());
    }

    #[test]
    fn test_const_assigns_once() {
        let mut slot = Slot::default();
        slot.declare(Attributes::PUBLIC | Attributes::CONST);
        assert_eq!(slot.assign(Value::int(1)), Ok(()));
        assert_eq!(slot.assign(Value::int(2)), Err(AssignError::Const));
        assert_eq!(slot.value(), &Value::int(1));
    }

    #[test]
    fn test_redeclare_unseals() {
        let mut slot = Slot::default();
        slot.declare(Attributes::CONST);
        assert_eq!(slot.assign(Value::int(1)), Ok(()));
        slot.declare(Attributes::CONST);
        assert_eq!(slot.assign(Value::int(2)), Ok(()));
    }

    #[test]
    fn test_undefined_is_rejected() {
        let mut slot = Slot::default();
        slot.declare(Attributes::PUBLIC);
        assert_eq!(slot.assign(Value::Undefined), Err(AssignError::Undefined));
        assert_eq!(slot.assign(Value::Null), Ok(()));
        assert_eq!(slot.assign(Value::int(5)), Ok(()));
        assert_eq!(slot.value(), &Value::int(5));
    }

    #[test]
    fn test_clear() {
        let mut slot = Slot::with_value(Value::string("x"));
        slot.clear();
        assert_eq!(slot, Slot::default());
    }
}
