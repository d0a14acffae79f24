use crate::observation::Adapter;

/// Default key expression prefix for all CNCSight observations.
pub const KEY_PREFIX: &str = "cncsight";

/// Builder for CNCSight key expressions.
///
/// Keys follow the pattern `<prefix>/<device>/<data_item>`, where the
/// prefix defaults to `cncsight/<adapter>`.
#[derive(Debug, Clone)]
pub struct KeyExprBuilder {
    prefix: String,
}

impl KeyExprBuilder {
    /// Create a builder using the default prefix for an adapter.
    pub fn new(adapter: Adapter) -> Self {
        Self {
            prefix: format!("{}/{}", KEY_PREFIX, adapter.as_str()),
        }
    }

    /// Create a builder with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// The prefix every key starts with.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build the key for one data item of a device.
    ///
    /// # Example
    /// ```
    /// use cncsight_common::keyexpr::KeyExprBuilder;
    /// use cncsight_common::observation::Adapter;
    ///
    /// let builder = KeyExprBuilder::new(Adapter::Haas);
    /// assert_eq!(builder.build("vf2", "execution"), "cncsight/haas/vf2/execution");
    /// ```
    pub fn build(&self, device: &str, data_item: &str) -> String {
        format!("{}/{}/{}", self.prefix, device, data_item)
    }

    /// Key for bridge status messages.
    ///
    /// # Example
    /// ```
    /// use cncsight_common::keyexpr::KeyExprBuilder;
    /// use cncsight_common::observation::Adapter;
    ///
    /// let builder = KeyExprBuilder::new(Adapter::Haas);
    /// assert_eq!(builder.status_key(), "cncsight/haas/@/status");
    /// ```
    pub fn status_key(&self) -> String {
        format!("{}/@/status", self.prefix)
    }
}
