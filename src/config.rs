use serde::{Deserialize, Serialize};

/// Main configuration for the invoicing core.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoreConfig {
    /// Prefix applied to every key before it touches the storage medium.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Persist the full state tree after every successful mutation.
    #[serde(default = "default_auto_persist")]
    pub auto_persist: bool,
    /// Maximum serialized size of a single stored entry, in bytes.
    #[serde(default = "default_max_entry_size")]
    pub max_entry_size: usize,
    /// Prefix for generated invoice numbers (`PREFIX-YYYYMM-NNNN`).
    #[serde(default = "default_invoice_prefix")]
    pub invoice_prefix: String,
    /// Delimiter for CSV export/import.
    #[serde(default = "default_csv_delimiter")]
    pub csv_delimiter: char,
}

fn default_namespace() -> String {
    "microbill_".to_string()
}

fn default_auto_persist() -> bool {
    true
}

/// 5 MiB, the cap of the original localStorage-style medium.
fn default_max_entry_size() -> usize {
    5 * 1024 * 1024
}

fn default_invoice_prefix() -> String {
    "FAC".to_string()
}

fn default_csv_delimiter() -> char {
    ','
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            auto_persist: default_auto_persist(),
            max_entry_size: default_max_entry_size(),
            invoice_prefix: default_invoice_prefix(),
            csv_delimiter: default_csv_delimiter(),
        }
    }
}

impl CoreConfig {
    /// Create a builder for constructing a configuration.
    #[must_use]
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

/// Builder for [`CoreConfig`].
///
/// # Example
///
/// ```rust
/// use microbill::CoreConfig;
///
/// let config = CoreConfig::builder()
///     .namespace("facility_")
///     .auto_persist(false)
///     .build();
/// assert_eq!(config.namespace, "facility_");
/// ```
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    config: Option<CoreConfig>,
}

impl CoreConfigBuilder {
    fn config_mut(&mut self) -> &mut CoreConfig {
        self.config.get_or_insert_with(CoreConfig::default)
    }

    /// Set the storage namespace prefix.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config_mut().namespace = namespace.into();
        self
    }

    /// Enable or disable state auto-persistence.
    #[must_use]
    pub fn auto_persist(mut self, enabled: bool) -> Self {
        self.config_mut().auto_persist = enabled;
        self
    }

    /// Set the maximum serialized entry size in bytes.
    #[must_use]
    pub fn max_entry_size(mut self, bytes: usize) -> Self {
        self.config_mut().max_entry_size = bytes;
        self
    }

    /// Set the invoice number prefix.
    #[must_use]
    pub fn invoice_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config_mut().invoice_prefix = prefix.into();
        self
    }

    /// Set the CSV delimiter.
    #[must_use]
    pub fn csv_delimiter(mut self, delimiter: char) -> Self {
        self.config_mut().csv_delimiter = delimiter;
        self
    }

    /// Build the final configuration.
    #[must_use]
    pub fn build(self) -> CoreConfig {
        self.config.unwrap_or_default()
    }
}
