/// A single predicate applied to a record's indexed fields.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
}

#[derive(Debug, Clone)]
pub enum FilterOp {
    /// Indexed `Str` field equals this value exactly.
    Eq(String),
    /// Indexed `Str` field is one of these values.
    In(Vec<String>),
    /// Indexed `Tags` field contains this tag.
    HasTag(String),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq(value.into()),
        }
    }

    pub fn has_tag(field: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::HasTag(tag.into()),
        }
    }

    pub fn one_of(field: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::In(values),
        }
    }
}
