//! Container ids, control-plane machine tags and instance namespaces.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{BerthError, BerthResult};

/// Prefix of every machine tag.
const TAG_PREFIX: &str = "machine-";

/// A validated container (machine) id.
///
/// Container ids must:
/// - Start with a host machine number (`0` or a number without leading zeros)
/// - Continue with `/<type>/<number>` pairs, where `<type>` is lowercase ASCII
///
/// `0`, `0/lxc/1` and `3/kvm/0/lxc/2` are valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContainerId(String);

impl ContainerId {
    /// Create a new container id, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the id format is invalid.
    pub fn new(id: impl Into<String>) -> BerthResult<Self> {
        let id = id.into();
        if Self::is_valid(&id) {
            Ok(Self(id))
        } else {
            Err(BerthError::InvalidContainerId { id })
        }
    }

    /// Get the container id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The control-plane tag for this container.
    #[must_use]
    pub fn tag(&self) -> MachineTag {
        MachineTag(format!("{TAG_PREFIX}{}", self.0.replace('/', "-")))
    }

    fn is_valid(id: &str) -> bool {
        let segments: Vec<&str> = id.split('/').collect();
        if segments.len() % 2 == 0 {
            return false;
        }
        segments.iter().enumerate().all(|(i, segment)| {
            if i % 2 == 0 {
                is_machine_number(segment)
            } else {
                !segment.is_empty() && segment.chars().all(|c| c.is_ascii_lowercase())
            }
        })
    }
}

fn is_machine_number(segment: &str) -> bool {
    match segment.as_bytes() {
        [] => false,
        [b'0'] => true,
        [b'0', ..] => false,
        bytes => bytes.iter().all(u8::is_ascii_digit),
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContainerId {
    type Err = BerthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContainerId {
    type Error = BerthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContainerId> for String {
    fn from(id: ContainerId) -> Self {
        id.0
    }
}

impl AsRef<str> for ContainerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Control-plane identifier of a machine or container, e.g. `machine-0-lxc-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MachineTag(String);

impl MachineTag {
    /// Parse a tag string back into a tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not `machine-` followed by a valid id.
    pub fn parse(tag: &str) -> BerthResult<Self> {
        let invalid = || BerthError::InvalidContainerId {
            id: tag.to_string(),
        };
        let rest = tag.strip_prefix(TAG_PREFIX).ok_or_else(invalid)?;
        let id = ContainerId::new(rest.replace('-', "/")).map_err(|_| invalid())?;
        Ok(id.tag())
    }

    /// The container id this tag refers to.
    #[must_use]
    pub fn id(&self) -> ContainerId {
        let rest = self.0.strip_prefix(TAG_PREFIX).unwrap_or(&self.0);
        ContainerId(rest.replace('-', "/"))
    }

    /// Get the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MachineTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for MachineTag {
    type Error = BerthError;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        Self::parse(&tag)
    }
}

impl From<MachineTag> for String {
    fn from(tag: MachineTag) -> Self {
        tag.0
    }
}

/// Instance-id namespace of one deployment.
///
/// Provider instance ids are the namespace prefix joined to the machine tag,
/// e.g. `berth-4f2a9c-machine-0-lxc-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    /// Create a namespace from its prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    /// The instance id a container gets in this namespace.
    #[must_use]
    pub fn instance_id(&self, id: &ContainerId) -> String {
        format!("{}-{}", self.0, id.tag())
    }

    /// Recover the machine tag from an instance id.
    ///
    /// # Errors
    ///
    /// Returns an error if the instance id does not carry this namespace's
    /// prefix or the remainder is not a valid machine tag.
    pub fn machine_tag(&self, instance_id: &str) -> BerthResult<MachineTag> {
        let invalid = || BerthError::InvalidInstanceId {
            id: instance_id.to_string(),
            namespace: self.0.clone(),
        };
        let tag = instance_id
            .strip_prefix(self.0.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .ok_or_else(invalid)?;
        MachineTag::parse(tag).map_err(|_| invalid())
    }

    /// Get the prefix as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_container_ids() {
        assert!(ContainerId::new("0").is_ok());
        assert!(ContainerId::new("0/lxc/1").is_ok());
        assert!(ContainerId::new("12/kvm/0").is_ok());
        assert!(ContainerId::new("3/kvm/0/lxc/2").is_ok());
    }

    #[test]
    fn invalid_container_ids() {
        assert!(ContainerId::new("").is_err());
        assert!(ContainerId::new("01").is_err());
        assert!(ContainerId::new("0/lxc").is_err());
        assert!(ContainerId::new("0/LXC/1").is_err());
        assert!(ContainerId::new("0/lxc/01").is_err());
        assert!(ContainerId::new("0//1").is_err());
        assert!(ContainerId::new("a/lxc/1").is_err());
    }

    #[test]
    fn tag_round_trip() {
        let id: ContainerId = "0/lxc/1".parse().unwrap();
        let tag = id.tag();
        assert_eq!(tag.as_str(), "machine-0-lxc-1");
        assert_eq!(tag.id(), id);
        assert_eq!(MachineTag::parse("machine-0-lxc-1").unwrap(), tag);
        assert!(MachineTag::parse("unit-mysql-0").is_err());
    }

    #[test]
    fn deserialized_tags_are_validated() {
        let tag: MachineTag = serde_json::from_str("\"machine-0-lxc-1\"").unwrap();
        assert_eq!(tag.id(), ContainerId::new("0/lxc/1").unwrap());
        assert_eq!(serde_json::to_string(&tag).unwrap(), "\"machine-0-lxc-1\"");

        assert!(serde_json::from_str::<MachineTag>("\"unit-x\"").is_err());
        assert!(serde_json::from_str::<MachineTag>("\"application-mysql\"").is_err());
        assert!(serde_json::from_str::<MachineTag>("\"machine-0-lxc\"").is_err());
    }

    #[test]
    fn namespace_instance_ids() {
        let ns = Namespace::new("berth-4f2a9c");
        let id = ContainerId::new("2/lxc/0").unwrap();
        let instance_id = ns.instance_id(&id);
        assert_eq!(instance_id, "berth-4f2a9c-machine-2-lxc-0");
        assert_eq!(ns.machine_tag(&instance_id).unwrap(), id.tag());

        let err = ns.machine_tag("other-machine-2-lxc-0").unwrap_err();
        assert!(matches!(err, BerthError::InvalidInstanceId { .. }));
        assert!(ns.machine_tag("berth-4f2a9c-bogus").is_err());
    }

    proptest::proptest! {
        #[test]
        fn generated_ids_round_trip_through_tags(
            host in 0u32..1000,
            nested in proptest::collection::vec(("[a-z]{2,5}", 0u32..100), 0..3),
        ) {
            let mut raw = host.to_string();
            for (kind, n) in &nested {
                raw.push_str(&format!("/{kind}/{n}"));
            }
            let id = ContainerId::new(raw).unwrap();
            proptest::prop_assert_eq!(id.tag().id(), id.clone());
            proptest::prop_assert_eq!(MachineTag::parse(id.tag().as_str()).unwrap(), id.tag());
        }
    }
}
