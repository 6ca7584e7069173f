use serde::Serialize;

#[derive(Serialize, Debug, Clone, Default, Ord, PartialOrd, Eq, PartialEq)]
pub(super) struct BindingResult {
    pub domain: String,
    pub address: String,
}
