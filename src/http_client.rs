use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Process-wide blocking client. The timeout is fixed at first use; later
/// callers share the already-built client.
pub fn http_client(timeout: Duration) -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")
    })
}
