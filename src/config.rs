//! Ledger configuration: account mapping, numbering, tax defaults, and feature flags.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::traits::{Feature, FeatureManager};

const ENV_PREFIX: &str = "PEMBUKUAN_";
const TMP_SUFFIX: &str = "tmp";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Delivery channel for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Mail,
    Database,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Mail => "mail",
            NotificationChannel::Database => "database",
        }
    }
}

impl FromStr for NotificationChannel {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mail" => Ok(NotificationChannel::Mail),
            "database" => Ok(NotificationChannel::Database),
            other => Err(ConfigError::InvalidValue {
                key: "notification_channels".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Account codes used when documents and payments are posted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountMapping {
    pub cash: String,
    pub receivable: String,
    pub payable: String,
    pub sales_revenue: String,
    pub purchase_expense: String,
    pub ppn_output: String,
    pub ppn_input: String,
    pub sales_discount: String,
    pub purchase_discount: String,
    pub retained_earnings: String,
}

impl Default for AccountMapping {
    fn default() -> Self {
        Self {
            cash: "1100".to_string(),
            receivable: "1200".to_string(),
            payable: "2100".to_string(),
            sales_revenue: "4100".to_string(),
            purchase_expense: "5100".to_string(),
            ppn_output: "2200".to_string(),
            ppn_input: "1400".to_string(),
            sales_discount: "4200".to_string(),
            purchase_discount: "5200".to_string(),
            retained_earnings: "3200".to_string(),
        }
    }
}

/// Prefixes for sequential document numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberingConfig {
    pub journal_prefix: String,
    pub invoice_prefix: String,
    pub bill_prefix: String,
    pub payment_prefix: String,
    pub width: usize,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            journal_prefix: "JE".to_string(),
            invoice_prefix: "INV".to_string(),
            bill_prefix: "BILL".to_string(),
            payment_prefix: "PAY".to_string(),
            width: 6,
        }
    }
}

impl NumberingConfig {
    pub fn format(&self, prefix: &str, sequence: u64) -> String {
        format!("{}-{:0width$}", prefix, sequence, width = self.width)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub recurring_documents: bool,
    pub payment_reminders: bool,
    pub overdue_notices: bool,
    /// Refuse invoices over the contact's credit limit instead of warning
    pub credit_limit_enforcement: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            recurring_documents: true,
            payment_reminders: true,
            overdue_notices: true,
            credit_limit_enforcement: false,
        }
    }
}

impl FeatureManager for FeatureFlags {
    fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::RecurringDocuments => self.recurring_documents,
            Feature::PaymentReminders => self.payment_reminders,
            Feature::OverdueNotices => self.overdue_notices,
            Feature::CreditLimitEnforcement => self.credit_limit_enforcement,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub accounts: AccountMapping,
    pub numbering: NumberingConfig,
    /// PPN percentage applied when a document does not carry its own rate
    pub default_tax_rate: BigDecimal,
    /// Days relative to the due date at which payment reminders are scheduled
    pub reminder_offsets_days: Vec<i64>,
    pub notification_channels: Vec<NotificationChannel>,
    pub features: FeatureFlags,
    /// Maximum date distance when matching bank lines to payments
    pub reconciliation_tolerance_days: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            accounts: AccountMapping::default(),
            numbering: NumberingConfig::default(),
            default_tax_rate: BigDecimal::from(11),
            reminder_offsets_days: vec![-3, 0, 7],
            notification_channels: vec![NotificationChannel::Mail, NotificationChannel::Database],
            features: FeatureFlags::default(),
            reconciliation_tolerance_days: 3,
        }
    }
}

impl LedgerConfig {
    /// Apply `PEMBUKUAN_*` overrides from key/value pairs.
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "DEFAULT_TAX_RATE" => {
                    self.default_tax_rate =
                        BigDecimal::from_str(value.trim()).map_err(|_| invalid(&key, &value))?;
                }
                "REMINDER_OFFSETS_DAYS" => {
                    self.reminder_offsets_days = value
                        .split(',')
                        .filter(|part| !part.trim().is_empty())
                        .map(|part| part.trim().parse::<i64>())
                        .collect::<Result<_, _>>()
                        .map_err(|_| invalid(&key, &value))?;
                }
                "NOTIFICATION_CHANNELS" => {
                    self.notification_channels = value
                        .split(',')
                        .filter(|part| !part.trim().is_empty())
                        .map(NotificationChannel::from_str)
                        .collect::<Result<_, _>>()?;
                }
                "RECONCILIATION_TOLERANCE_DAYS" => {
                    self.reconciliation_tolerance_days =
                        value.trim().parse().map_err(|_| invalid(&key, &value))?;
                }
                "FEATURE_RECURRING_DOCUMENTS" => {
                    self.features.recurring_documents = parse_flag(&key, &value)?
                }
                "FEATURE_PAYMENT_REMINDERS" => {
                    self.features.payment_reminders = parse_flag(&key, &value)?
                }
                "FEATURE_OVERDUE_NOTICES" => {
                    self.features.overdue_notices = parse_flag(&key, &value)?
                }
                "FEATURE_CREDIT_LIMIT_ENFORCEMENT" => {
                    self.features.credit_limit_enforcement = parse_flag(&key, &value)?
                }
                _ => tracing::debug!(key = %key, "ignoring unknown configuration override"),
            }
        }
        Ok(())
    }

    /// Defaults overlaid with the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(std::env::vars())?;
        Ok(config)
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

/// Handles persistence of [`LedgerConfig`] as JSON.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the stored config (defaults when the file is absent) and apply environment overrides
    pub fn load(&self) -> Result<LedgerConfig, ConfigError> {
        let mut config = self.load_file()?;
        config.apply_overrides(std::env::vars())?;
        Ok(config)
    }

    pub fn load_file(&self) -> Result<LedgerConfig, ConfigError> {
        if self.config_path.exists() {
            let data = fs::read_to_string(&self.config_path)?;
            serde_json::from_str(&data).map_err(|err| ConfigError::Serde(err.to_string()))
        } else {
            Ok(LedgerConfig::default())
        }
    }

    pub fn save(&self, config: &LedgerConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(config)
            .map_err(|err| ConfigError::Serde(err.to_string()))?;
        let tmp = self.config_path.with_extension(TMP_SUFFIX);
        let mut file = fs::File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &self.config_path)?;
        Ok(())
    }
}
