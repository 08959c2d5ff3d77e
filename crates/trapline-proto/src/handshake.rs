//! The `Inquire`/`Describe` exchange that binds the handshake environment.

use crate::error::ProtocolError;
use crate::messages::{Env, SystemDescription, PROTOCOL_VERSION};

/// Result of a successful handshake: the device's self-description plus the
/// environment derived from it, ready to hand to [`crate::messages::CodecTable::bind`].
#[derive(Debug, Clone)]
pub struct Handshake {
    /// The device's decoded self-description.
    pub description: SystemDescription,
    /// The environment derived from `description`, plus any bound extensions.
    pub env: Env,
}

impl Handshake {
    /// Build the bound environment from a decoded `Describe` reply, checking
    /// the protocol version along the way.
    pub fn from_description(description: SystemDescription) -> Result<Self, ProtocolError> {
        if description.version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                found: description.version,
            });
        }
        let mut env = Env::new();
        env.bind("NUM_AXIS", description.axis_count);
        Ok(Self { description, env })
    }

    /// Bind an optional extension parameter (e.g. `PERIPHERAL_STATUS`) that
    /// a particular device exposes beyond the fixed `SystemDescription`
    /// fields. Devices that don't expose an extension simply never call
    /// this, and the corresponding message kind stays absent from the
    /// bound codec table.
    pub fn bind_extension(&mut self, name: &'static str, value: u32) {
        self.env.bind(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description() -> SystemDescription {
        SystemDescription { version: PROTOCOL_VERSION, axis_count: 3, magic: 0xDEAD_BEEF, buffer_size: 64 }
    }

    #[test]
    fn binds_num_axis_from_axis_count() {
        let handshake = Handshake::from_description(description()).unwrap();
        assert_eq!(handshake.env.get("NUM_AXIS"), Some(3));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut desc = description();
        desc.version = 99;
        assert!(Handshake::from_description(desc).is_err());
    }

    #[test]
    fn extensions_are_opt_in() {
        let mut handshake = Handshake::from_description(description()).unwrap();
        assert_eq!(handshake.env.get("PERIPHERAL_STATUS"), None);
        handshake.bind_extension("PERIPHERAL_STATUS", 2);
        assert_eq!(handshake.env.get("PERIPHERAL_STATUS"), Some(2));
    }
}
