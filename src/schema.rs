use crate::error::{ConsolidationError, Result};
use crate::scale::ScaleDeclaration;
use crate::utils::{normalize_label, validate_fiscal_year_end_month};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

pub const DEFAULT_OTHER_ENTITY: &str = "other";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum AccountBehavior {
    #[schemars(
        description = "Flow accounts (Income Statement) are reported as year-to-date cumulative amounts. Discrete quarter values are derived by subtracting the previous quarter's cumulative amount."
    )]
    Flow,

    #[schemars(
        description = "Stock accounts (Balance Sheet) are point-in-time balances at quarter end. They are reconciled per quarter but never decomposed; the quarter value IS the balance."
    )]
    Stock,
}

impl Default for AccountBehavior {
    fn default() -> Self {
        Self::Flow
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AccountDefinition {
    #[schemars(description = "Canonical account key used in the report and the dashboard export (e.g. '매출액', 'revenue').")]
    pub key: String,

    #[serde(default)]
    #[schemars(description = "Whether the source figures are cumulative flows or point-in-time balances. Defaults to Flow.")]
    pub behavior: AccountBehavior,

    #[serde(default)]
    #[schemars(
        description = "Raw row labels that map onto this account (e.g. 'Ⅰ.매출액'). Matching ignores all whitespace. The key itself always matches."
    )]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EntityDefinition {
    #[schemars(description = "Canonical entity key (e.g. 'OC(국내)', '중국').")]
    pub key: String,

    #[serde(default)]
    #[schemars(
        description = "Raw column or subsidiary labels that roll up into this entity. Several aliases may map to the same entity; their amounts are summed."
    )]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum TermSign {
    Add,
    Subtract,
}

impl Default for TermSign {
    fn default() -> Self {
        Self::Add
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AccountTerm {
    #[schemars(description = "Key of a configured account or of a derived account defined earlier in the list.")]
    pub account: String,

    #[serde(default)]
    pub sign: TermSign,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DerivedAccount {
    #[schemars(description = "Canonical key of the derived account (e.g. '인건비' for salaries + retirement benefits).")]
    pub key: String,

    #[schemars(
        description = "Signed terms summed to build the account. A residual account such as 'other SG&A' subtracts its siblings from the parent total."
    )]
    pub terms: Vec<AccountTerm>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExportOptions {
    #[serde(default)]
    #[schemars(
        description = "When set, the consolidated total is exported as an extra entity under this key (e.g. '연결') so the dashboard can cross-check."
    )]
    pub consolidated_key: Option<String>,

    #[serde(default = "default_true")]
    #[schemars(
        description = "Emit '<year>_4Q_Year' in addition to its '<year>_Year' alias for the fourth quarter cumulative snapshot."
    )]
    pub emit_q4_cumulative_key: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            consolidated_key: None,
            emit_q4_cumulative_key: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_other_entity() -> String {
    DEFAULT_OTHER_ENTITY.to_string()
}

fn default_fiscal_year_end_month() -> u32 {
    12
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReportConfig {
    #[schemars(description = "The legal name of the consolidated group.")]
    pub organization_name: String,

    #[serde(default = "default_fiscal_year_end_month")]
    #[schemars(
        description = "The month when the fiscal year ends (1 = January, 12 = December). Fiscal years are named by the calendar year they end in."
    )]
    pub fiscal_year_end_month: u32,

    #[schemars(
        description = "Ordered list of known reporting entities. Everything not attributable to these lands in the synthetic other entity."
    )]
    pub entities: Vec<EntityDefinition>,

    #[schemars(description = "Accounts read from the source figures.")]
    pub accounts: Vec<AccountDefinition>,

    #[serde(default)]
    #[schemars(description = "Accounts computed as signed sums of other accounts, evaluated in list order.")]
    pub derived_accounts: Vec<DerivedAccount>,

    #[serde(default = "default_other_entity")]
    #[schemars(description = "Key of the synthetic consolidation-adjustment entity (e.g. '기타'). Defaults to 'other'.")]
    pub other_entity: String,

    #[serde(default)]
    #[schemars(description = "Scale applied exactly once when exporting dashboard values.")]
    pub scale: ScaleDeclaration,

    #[serde(default)]
    pub export: ExportOptions,
}

impl ReportConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ReportConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn entity_keys(&self) -> Vec<String> {
        self.entities.iter().map(|e| e.key.clone()).collect()
    }

    /// Behaviour of every reportable account, source and derived, keyed by account.
    ///
    /// A derived account inherits the behaviour of its terms; `validate` guarantees
    /// they agree.
    pub fn account_behaviors(&self) -> BTreeMap<String, AccountBehavior> {
        let mut behaviors: BTreeMap<String, AccountBehavior> = self
            .accounts
            .iter()
            .map(|a| (a.key.clone(), a.behavior))
            .collect();

        for derived in &self.derived_accounts {
            let behavior = derived
                .terms
                .first()
                .and_then(|t| behaviors.get(&t.account).copied())
                .unwrap_or_default();
            behaviors.insert(derived.key.clone(), behavior);
        }

        behaviors
    }

    pub fn validate(&self) -> Result<()> {
        validate_fiscal_year_end_month(self.fiscal_year_end_month)?;
        self.scale.validate()?;

        if self.other_entity.trim().is_empty() {
            return Err(invalid_config("other_entity must not be empty"));
        }

        let mut entity_keys = HashSet::new();
        for entity in &self.entities {
            if !entity_keys.insert(entity.key.as_str()) {
                return Err(invalid_config(format!(
                    "Duplicate entity key '{}'",
                    entity.key
                )));
            }
        }

        if entity_keys.contains(self.other_entity.as_str()) {
            return Err(invalid_config(format!(
                "other_entity '{}' collides with a known entity",
                self.other_entity
            )));
        }

        if let Some(consolidated_key) = &self.export.consolidated_key {
            if entity_keys.contains(consolidated_key.as_str()) || *consolidated_key == self.other_entity
            {
                return Err(invalid_config(format!(
                    "export.consolidated_key '{}' collides with an entity key",
                    consolidated_key
                )));
            }
        }

        let mut behaviors: BTreeMap<&str, AccountBehavior> = BTreeMap::new();
        for account in &self.accounts {
            if behaviors.insert(&account.key, account.behavior).is_some() {
                return Err(invalid_config(format!(
                    "Duplicate account key '{}'",
                    account.key
                )));
            }
        }

        check_label_collisions(
            "entity",
            self.entities.iter().map(|e| (e.key.as_str(), e.aliases.as_slice())),
        )?;
        check_label_collisions(
            "account",
            self.accounts.iter().map(|a| (a.key.as_str(), a.aliases.as_slice())),
        )?;

        for derived in &self.derived_accounts {
            if derived.terms.is_empty() {
                return Err(invalid_config(format!(
                    "Derived account '{}' has no terms",
                    derived.key
                )));
            }

            let mut derived_behavior: Option<AccountBehavior> = None;
            for term in &derived.terms {
                let behavior = behaviors.get(term.account.as_str()).copied().ok_or_else(|| {
                    ConsolidationError::UnknownAccountReference {
                        derived: derived.key.clone(),
                        account: term.account.clone(),
                    }
                })?;

                match derived_behavior {
                    Some(existing) if existing != behavior => {
                        return Err(invalid_config(format!(
                            "Derived account '{}' mixes Flow and Stock terms",
                            derived.key
                        )));
                    }
                    _ => derived_behavior = Some(behavior),
                }
            }

            if let Some(behavior) = derived_behavior {
                if behaviors.insert(&derived.key, behavior).is_some() {
                    return Err(invalid_config(format!(
                        "Duplicate account key '{}'",
                        derived.key
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ReportConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// Keys and aliases are matched with whitespace removed, so two definitions
/// must not share a label in that form.
fn check_label_collisions<'a>(
    kind: &str,
    definitions: impl Iterator<Item = (&'a str, &'a [String])>,
) -> Result<()> {
    let mut owners: HashMap<String, &str> = HashMap::new();
    for (key, aliases) in definitions {
        for label in std::iter::once(key).chain(aliases.iter().map(String::as_str)) {
            let owner = *owners.entry(normalize_label(label)).or_insert(key);
            if owner != key {
                return Err(invalid_config(format!(
                    "{} label '{}' is used by both '{}' and '{}'",
                    kind, label, owner, key
                )));
            }
        }
    }
    Ok(())
}

fn invalid_config(details: impl Into<String>) -> ConsolidationError {
    ConsolidationError::InvalidConfig {
        details: details.into(),
    }
}
