use crate::shared::math::l2_normalize;

/// Column separator of the identity table.
pub const FIELD_DELIMITER: &str = ",";

/// A registered person: label, optional auxiliary fields, reference features.
///
/// Features are stored L2-normalized so a dot product is a cosine similarity.
#[derive(Clone, Debug, PartialEq)]
pub struct IdentityRecord {
    label: String,
    aux: Vec<String>,
    features: Vec<f32>,
}

impl IdentityRecord {
    pub fn new(label: impl Into<String>, aux: Vec<String>, mut features: Vec<f32>) -> Self {
        l2_normalize(&mut features);
        Self {
            label: label.into(),
            aux,
            features,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn aux(&self) -> &[String] {
        &self.aux
    }

    pub fn features(&self) -> &[f32] {
        &self.features
    }

    /// Text shown next to an identified face: `label` or `label (aux, ...)`.
    pub fn display_string(&self) -> String {
        if self.aux.is_empty() {
            self.label.clone()
        } else {
            format!("{} ({})", self.label, self.aux.join(", "))
        }
    }

    /// Serializes the record as one line of the identity table (no newline).
    pub fn to_row(&self) -> String {
        let features = self
            .features
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let mut columns: Vec<&str> = Vec::with_capacity(self.aux.len() + 2);
        columns.push(&self.label);
        columns.extend(self.aux.iter().map(String::as_str));
        columns.push(&features);
        columns.join(FIELD_DELIMITER)
    }
}
