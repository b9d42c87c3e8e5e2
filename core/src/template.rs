use std::collections::BTreeMap;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::digest::compute_template_id;

/// Placeholder replaced by the lowercase account address.
pub const ETH_ADDR_PLACEHOLDER: &str = "{ethAddr}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandTemplate {
    /// Identifier as registered on-chain. Informational; the pipeline uses
    /// [`compute_template_id`](crate::digest::compute_template_id).
    #[serde(default)]
    pub template_id: String,
    pub command_template: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl CommandTemplate {
    pub fn new(tokens: &[&str], description: &str) -> Self {
        Self {
            template_id: String::new(),
            command_template: tokens.iter().map(|t| t.to_string()).collect(),
            description: description.to_string(),
        }
    }

    /// Joins the tokens with single spaces, substituting the account.
    pub fn render(&self, account: &Address) -> String {
        let account = format!("{account:#x}");
        self.command_template
            .iter()
            .map(|token| token.replace(ETH_ADDR_PLACEHOLDER, &account))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// One checksummed account address per placeholder.
    pub fn command_params(&self, account: &Address) -> Vec<String> {
        self.command_template
            .iter()
            .filter(|token| token.contains(ETH_ADDR_PLACEHOLDER))
            .map(|_| account.to_checksum(None))
            .collect()
    }
}

/// Templates keyed by index, as stored in `templates.json`.
pub type TemplateBook = BTreeMap<String, CommandTemplate>;

/// The acceptance and recovery templates shipped by default.
pub fn default_templates() -> TemplateBook {
    let defaults: [(&[&str], &str); 2] = [
        (
            &["Accept", "guardian", "request", "for", ETH_ADDR_PLACEHOLDER],
            "Guardian acceptance template",
        ),
        (
            &["Recover", "account", "for", ETH_ADDR_PLACEHOLDER],
            "Account recovery template",
        ),
    ];
    defaults
        .into_iter()
        .zip(0u32..)
        .map(|((tokens, description), index)| {
            let mut template = CommandTemplate::new(tokens, description);
            template.template_id = compute_template_id(index).to_string();
            (index.to_string(), template)
        })
        .collect()
}
