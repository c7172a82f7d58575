/// Reply to a person or photo mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionReply {
    pub success: bool,
    pub message: Option<String>,
    pub faces_tagged: Option<u32>,
    pub faces_untagged: Option<u32>,
}

impl ActionReply {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// A named person that faces can be transferred to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedPerson {
    pub name: String,
    pub count: u32,
}

/// Reply to `get_named_people_for_transfer`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferTargets {
    pub success: bool,
    pub people: Vec<NamedPerson>,
    pub message: Option<String>,
}
