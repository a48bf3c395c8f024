//! Handlers served by the `dyndispatch` binary.
//!
//! - `GET /dynamic/account/photo/{id}.jpg` returns the JPEG stored for the
//!   account in [`PhotoStore`].
//! - `GET /dynamic/echo/echo/{text}` echoes `text` back from an async action,
//!   prefixed by [`EchoPrefix`] when one is registered.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use thiserror::Error;

use crate::dispatcher::{
    parse_argument, ActionError, HandlerDescriptor, HandlerRegistry, InvocationOutcome,
    RegistryError, ServiceRegistry,
};

/// In-memory account photos keyed by account id.
#[derive(Debug, Default)]
pub struct PhotoStore {
    photos: RwLock<HashMap<u64, Vec<u8>>>,
}

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("no photo stored for account {0}")]
    NotFound(u64),
    #[error("photo store lock poisoned")]
    Poisoned,
}

impl PhotoStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a generated photo for each id.
    #[must_use]
    pub fn seeded(ids: impl IntoIterator<Item = u64>) -> Self {
        let photos = ids.into_iter().map(|id| (id, placeholder_jpeg(id))).collect();
        Self {
            photos: RwLock::new(photos),
        }
    }

    /// # Errors
    ///
    /// [`PhotoError::Poisoned`] if a writer panicked.
    pub fn put(&self, account_id: u64, bytes: Vec<u8>) -> Result<(), PhotoError> {
        self.photos
            .write()
            .map_err(|_| PhotoError::Poisoned)?
            .insert(account_id, bytes);
        Ok(())
    }

    /// # Errors
    ///
    /// [`PhotoError::NotFound`] for unknown accounts.
    pub fn get(&self, account_id: u64) -> Result<Vec<u8>, PhotoError> {
        self.photos
            .read()
            .map_err(|_| PhotoError::Poisoned)?
            .get(&account_id)
            .cloned()
            .ok_or(PhotoError::NotFound(account_id))
    }
}

/// Minimal JFIF-framed payload: SOI, APP0 header, the id, EOI.
#[must_use]
pub fn placeholder_jpeg(account_id: u64) -> Vec<u8> {
    let mut bytes = vec![
        0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00,
        0x01, 0x00, 0x01, 0x00, 0x00,
    ];
    bytes.extend_from_slice(&account_id.to_be_bytes());
    bytes.extend_from_slice(&[0xFF, 0xD9]);
    bytes
}

/// Serves account photos.
pub struct AccountController {
    store: Arc<PhotoStore>,
}

impl AccountController {
    /// # Errors
    ///
    /// Unknown account or unparseable id.
    pub fn photo(&self, arguments: &[String]) -> Result<Vec<u8>, ActionError> {
        let id: u64 = parse_argument(arguments, 0)?;
        Ok(self.store.get(id)?)
    }
}

/// Text prepended to every echo.
#[derive(Debug, Clone)]
pub struct EchoPrefix(pub String);

/// Echoes its argument after a short async delay.
pub struct EchoController {
    prefix: Option<Arc<EchoPrefix>>,
    delay: Duration,
}

impl EchoController {
    fn echo(&self, arguments: &[String]) -> InvocationOutcome {
        let text = arguments.first().cloned().unwrap_or_default();
        let prefix = self.prefix.as_ref().map(|p| p.0.clone()).unwrap_or_default();
        let delay = self.delay;
        InvocationOutcome::pending(async move {
            tokio::time::sleep(delay).await;
            Ok::<_, ActionError>(format!("{prefix}{text}").into_bytes())
        })
    }
}

/// Registry holding [`AccountController`] and [`EchoController`].
///
/// # Errors
///
/// Only on duplicate registration, which cannot happen here unless the
/// handler names are changed.
pub fn demo_registry(namespace: &str) -> Result<HandlerRegistry, RegistryError> {
    let account = HandlerDescriptor::builder::<AccountController>("AccountController")
        .depends_on::<PhotoStore>()
        .constructor(|args| {
            Ok(AccountController {
                store: args.require::<PhotoStore>()?,
            })
        })
        .action("photo", 1, |controller, args| {
            InvocationOutcome::from_result(controller.photo(args))
        })
        .build();

    let echo = HandlerDescriptor::builder::<EchoController>("EchoController")
        .optional::<EchoPrefix>()
        .constructor(|args| {
            Ok(EchoController {
                prefix: args.get::<EchoPrefix>(),
                delay: Duration::from_millis(1),
            })
        })
        .action("echo", 1, |controller, args| controller.echo(args))
        .build();

    Ok(HandlerRegistry::builder(namespace)
        .register(account)?
        .register(echo)?
        .build())
}

/// Services for the demo handlers: a photo store seeded with a few accounts.
#[must_use]
pub fn demo_services() -> ServiceRegistry {
    ServiceRegistry::new().with(PhotoStore::seeded([1, 42, 1045]))
}
