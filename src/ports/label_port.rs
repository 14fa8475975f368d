//! Label persistence port.

use crate::domain::error::LabelTraderError;
use crate::domain::label::{LabelDefinition, LabelMember, LabelSummary};

pub trait LabelPort: Send + Sync {
    /// Atomically replaces any label with the same name, members included.
    fn replace_label(
        &self,
        definition: &LabelDefinition,
        members: &[LabelMember],
    ) -> Result<(), LabelTraderError>;

    fn get_label(&self, name: &str) -> Result<Option<LabelDefinition>, LabelTraderError>;

    /// Members ordered by rank.
    fn get_label_members(&self, name: &str) -> Result<Vec<LabelMember>, LabelTraderError>;

    /// Labels newest first, with member counts.
    fn list_labels(&self) -> Result<Vec<LabelSummary>, LabelTraderError>;

    /// Removes a label and its members. Returns false when nothing matched.
    fn delete_label(&self, name: &str) -> Result<bool, LabelTraderError>;
}
