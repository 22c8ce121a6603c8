use super::id::{ObjectKey, ObjectType};

/// One edge from the dictionary dependency view: `owner` uses `referenced`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DependencyEdge {
    pub owner: ObjectKey,
    pub owner_type: ObjectType,
    pub referenced: ObjectKey,
    pub referenced_type: ObjectType,
}
