//! Service selection from catalog tags

use crate::constraints::match_tags;
use crate::Result;

/// Outcome of filtering one service name
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterDecision {
    /// Exposed, resolved through the Connect endpoints when `connect` is set
    Include { connect: bool },
    /// Not enabled, or explicitly disabled, through its tags
    Disabled,
    /// Rejected by the constraint expression
    Pruned,
}

/// Decides from its tags whether a service is exposed and in which mode
#[derive(Clone, Debug)]
pub struct TagFilter {
    prefix: String,
    constraints: String,
    exposed_by_default: bool,
    connect_by_default: bool,
}

impl TagFilter {
    pub fn new(
        prefix: impl Into<String>,
        constraints: impl Into<String>,
        exposed_by_default: bool,
        connect_by_default: bool,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            constraints: constraints.into(),
            exposed_by_default,
            connect_by_default,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn constraints(&self) -> &str {
        &self.constraints
    }

    /// Tag passed to the catalog's own filter when fetching registrations
    pub fn catalog_tag(&self) -> Option<String> {
        if self.exposed_by_default {
            None
        } else {
            Some(self.tag("enable=true"))
        }
    }

    /// Apply the filter to the tag set of one service.
    ///
    /// Errors come from evaluating the constraint expression and only concern
    /// this service.
    pub fn decide(&self, tags: &[String]) -> Result<FilterDecision> {
        if !self.exposed_by_default && !contains(tags, &self.tag("enable=true")) {
            return Ok(FilterDecision::Disabled);
        }

        if contains(tags, &self.tag("enable=false")) {
            return Ok(FilterDecision::Disabled);
        }

        if !match_tags(tags, &self.constraints)? {
            return Ok(FilterDecision::Pruned);
        }

        let connect = if contains(tags, &self.tag("connect=true")) {
            true
        } else if contains(tags, &self.tag("connect=false")) {
            false
        } else {
            self.connect_by_default
        };

        Ok(FilterDecision::Include { connect })
    }

    fn tag(&self, suffix: &str) -> String {
        format!("{}.{}", self.prefix, suffix)
    }
}

/// Case-insensitive exact membership
fn contains(values: &[String], val: &str) -> bool {
    values.iter().any(|v| {
        v.chars()
            .flat_map(char::to_lowercase)
            .eq(val.chars().flat_map(char::to_lowercase))
    })
}
