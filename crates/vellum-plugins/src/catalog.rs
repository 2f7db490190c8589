//! The plugin catalog: known plugins and how to build them from configuration.

use crate::{Initializer, InterceptPoint, Interceptor, PluginHandler, PluginRegistration, RegistryError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use vellum_config::VellumConfig;
use vellum_predicate::Predicate;

type Factory = Arc<dyn Fn(&Value) -> Result<PluginHandler, String> + Send + Sync>;

struct CatalogEntry {
    point: InterceptPoint,
    priority: i32,
    enabled_by_default: bool,
    factory: Factory,
}

/// Named plugin factories.
///
/// Each entry declares its interception point, a default priority and
/// whether it runs without being configured. [`registrations`](Self::registrations)
/// turns a [`VellumConfig`] into registrations, in plugin name order.
///
/// # Example
///
/// ```
/// use vellum_config::ConfigLoader;
/// use vellum_core::{Exchange, VellumError};
/// use vellum_plugins::{BoxFuture, Flow, InterceptPoint, Interceptor, PluginCatalog};
///
/// struct Tag(String);
///
/// impl Interceptor for Tag {
///     fn handle<'a>(&'a self, exchange: &'a mut Exchange) -> BoxFuture<'a, Result<Flow, VellumError>> {
///         Box::pin(async move {
///             exchange
///                 .response_headers_mut()
///                 .insert("x-tag", self.0.parse().map_err(|_| VellumError::internal("bad tag"))?);
///             Ok(Flow::Continue)
///         })
///     }
/// }
///
/// let catalog = PluginCatalog::new().interceptor("tag", InterceptPoint::AfterHandler, 0, |args| {
///     Ok(Tag(args["value"].as_str().unwrap_or("none").to_string()))
/// });
///
/// let config = ConfigLoader::new()
///     .with_overrides("/plugins/tag/args->{value: 'blue'}")
///     .unwrap()
///     .load()
///     .unwrap();
///
/// let registrations = catalog.registrations(&config).unwrap();
/// assert_eq!(registrations.len(), 1);
/// ```
#[derive(Default)]
pub struct PluginCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl PluginCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an interceptor factory. The plugin only runs when configured.
    pub fn interceptor<F, I>(self, name: &str, point: InterceptPoint, priority: i32, factory: F) -> Self
    where
        F: Fn(&Value) -> Result<I, String> + Send + Sync + 'static,
        I: Interceptor,
    {
        self.insert(name, point, priority, false, move |args| {
            factory(args).map(|i| PluginHandler::Interceptor(Arc::new(i)))
        })
    }

    /// Adds an initializer factory. The plugin only runs when configured.
    pub fn initializer<F, I>(self, name: &str, point: InterceptPoint, priority: i32, factory: F) -> Self
    where
        F: Fn(&Value) -> Result<I, String> + Send + Sync + 'static,
        I: Initializer,
    {
        self.insert(name, point, priority, false, move |args| {
            factory(args).map(|i| PluginHandler::Initializer(Arc::new(i)))
        })
    }

    /// Marks a known plugin as running unless configuration disables it.
    pub fn enabled_by_default(mut self, name: &str) -> Self {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.enabled_by_default = true;
        }
        self
    }

    fn insert<F>(mut self, name: &str, point: InterceptPoint, priority: i32, enabled_by_default: bool, factory: F) -> Self
    where
        F: Fn(&Value) -> Result<PluginHandler, String> + Send + Sync + 'static,
    {
        self.entries.insert(
            name.to_string(),
            CatalogEntry {
                point,
                priority,
                enabled_by_default,
                factory: Arc::new(factory),
            },
        );
        self
    }

    /// Whether the catalog knows `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Builds registrations for every enabled plugin.
    ///
    /// Configured `priority` and `predicate` replace the catalog defaults.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::UnknownPlugin`] if configuration names a plugin the catalog lacks
    /// - [`RegistryError::InvalidPredicate`] if a predicate does not parse
    /// - [`RegistryError::Factory`] if a factory rejects its arguments
    pub fn registrations(&self, config: &VellumConfig) -> Result<Vec<PluginRegistration>, RegistryError> {
        if let Some(unknown) = config.plugins.keys().find(|name| !self.contains(name)) {
            return Err(RegistryError::UnknownPlugin(unknown.clone()));
        }

        let mut registrations = Vec::new();
        for (name, entry) in &self.entries {
            let settings = config.plugins.get(name);
            if !settings.map_or(entry.enabled_by_default, |s| s.enabled) {
                tracing::debug!(plugin = %name, "plugin disabled");
                continue;
            }

            let null = Value::Null;
            let args = settings.map_or(&null, |s| &s.args);
            let handler = (entry.factory)(args).map_err(|message| RegistryError::factory(name, message))?;

            let mut registration = PluginRegistration::new(name.clone(), entry.point, handler)
                .with_priority(settings.and_then(|s| s.priority).unwrap_or(entry.priority));

            if let Some(text) = settings.and_then(|s| s.predicate.as_deref()) {
                let predicate = Predicate::parse(text).map_err(|source| RegistryError::InvalidPredicate {
                    name: name.clone(),
                    source,
                })?;
                registration = registration.with_predicate(predicate);
            }

            registrations.push(registration);
        }
        Ok(registrations)
    }
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("plugins", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
