//! Query, sort and update descriptions shared by every store backend.
//!
//! Fields are addressed by dotted paths into the JSON document
//! (`activity.total_reads`, `personal_info.username`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A composable filter condition.
///
/// Leaf conditions test one field, `And` / `Or` combine them. An empty `And`
/// matches every document, an empty `Or` matches none.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { field: String, value: Value },
    Ne { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    /// Array field holds `value` as one of its elements.
    Contains { field: String, value: Value },
    /// Case-insensitive literal substring match on a string field.
    TextContains { field: String, value: String },
    Lt { field: String, value: Value },
    Gt { field: String, value: Value },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    /// Matches every document.
    pub fn all() -> Self {
        Self::And(Vec::new())
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Contains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn text_contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::TextContains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gt {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::eq("_id", id.into())
    }

    pub fn and(conditions: impl IntoIterator<Item = Filter>) -> Self {
        Self::And(conditions.into_iter().collect())
    }

    pub fn or(conditions: impl IntoIterator<Item = Filter>) -> Self {
        Self::Or(conditions.into_iter().collect())
    }

    /// Append one more condition, flattening into an existing `And`.
    pub fn with(self, condition: Filter) -> Self {
        match self {
            Self::And(mut conditions) => {
                conditions.push(condition);
                Self::And(conditions)
            }
            other => Self::And(vec![other, condition]),
        }
    }

    /// Append a condition only when it is present.
    pub fn with_opt(self, condition: Option<Filter>) -> Self {
        match condition {
            Some(c) => self.with(c),
            None => self,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub const fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Ordered list of sort keys, the first one being the most significant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sort(pub Vec<(String, SortOrder)>);

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self(vec![(field.into(), SortOrder::Asc)])
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self(vec![(field.into(), SortOrder::Desc)])
    }

    pub fn then_desc(mut self, field: impl Into<String>) -> Self {
        self.0.push((field.into(), SortOrder::Desc));
        self
    }

    /// Append `_id` ascending unless already present, turning the sort into a total order.
    pub fn with_id_tiebreak(mut self) -> Self {
        if !self.0.iter().any(|(field, _)| field == "_id") {
            self.0.push(("_id".to_string(), SortOrder::Asc));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Sort,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn sorted(sort: Sort) -> Self {
        Self {
            sort,
            ..Default::default()
        }
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    Set { field: String, value: Value },
    Unset { field: String },
    Inc { field: String, by: i64 },
    /// Increment, then raise the result to `floor` if it went below.
    IncClamped { field: String, by: i64, floor: i64 },
    Push { field: String, value: Value },
    /// Remove every element equal to `value` from an array field.
    Pull { field: String, value: Value },
}

/// A list of field operations applied atomically to one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update(pub Vec<UpdateOp>);

impl Update {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push(UpdateOp::Set {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.0.push(UpdateOp::Unset { field: field.into() });
        self
    }

    pub fn inc(mut self, field: impl Into<String>, by: i64) -> Self {
        self.0.push(UpdateOp::Inc {
            field: field.into(),
            by,
        });
        self
    }

    pub fn inc_clamped(mut self, field: impl Into<String>, by: i64, floor: i64) -> Self {
        self.0.push(UpdateOp::IncClamped {
            field: field.into(),
            by,
            floor,
        });
        self
    }

    pub fn push(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push(UpdateOp::Push {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn pull(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push(UpdateOp::Pull {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Concatenate two updates.
    pub fn merge(mut self, other: Update) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
