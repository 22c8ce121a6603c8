/// Trigger metadata as reported by the dictionary, keyed per owning table in
/// the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerDef {
    pub name: String,
    pub event: String,
    pub status: String,
}
