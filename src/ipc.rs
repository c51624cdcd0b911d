//! Session-bus method calls
//!
//! Calls are started on the tokio runtime and not awaited by the dispatch
//! loop. The outcome is only logged.

use crate::actions::{MethodCall, MethodCaller};
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

/// Fire-and-forget caller on a shared session-bus connection
pub struct SessionBus {
    connection: zbus::Connection,
}

impl SessionBus {
    pub async fn connect() -> Result<Self> {
        let connection = zbus::Connection::session()
            .await
            .context("D-Bus session bus not available")?;
        info!("Connected to D-Bus session bus");
        Ok(Self { connection })
    }
}

impl MethodCaller for SessionBus {
    fn call(&self, call: &MethodCall) -> Result<()> {
        let connection = self.connection.clone();
        let call = call.clone();

        tokio::runtime::Handle::try_current()
            .context("no tokio runtime to run the D-Bus call on")?
            .spawn(async move {
                match send(&connection, &call).await {
                    Ok(()) => debug!("D-Bus call {} on {} returned", call.member, call.destination),
                    Err(e) => warn!("D-Bus call {} on {} failed: {}", call.member, call.destination, e),
                }
            });
        Ok(())
    }
}

async fn send(connection: &zbus::Connection, call: &MethodCall) -> zbus::Result<()> {
    let destination = Some(call.destination.as_str());
    let interface = call.interface.as_deref();
    let path = call.path.as_str();
    let member = call.member.as_str();

    match &call.argument {
        Some(arg) => {
            connection
                .call_method(destination, path, interface, member, &(arg.as_str(),))
                .await?
        }
        None => connection.call_method(destination, path, interface, member, &()).await?,
    };
    Ok(())
}

/// Stand-in when no session bus could be reached; every call fails
pub struct NoSessionBus;

impl MethodCaller for NoSessionBus {
    fn call(&self, _call: &MethodCall) -> Result<()> {
        anyhow::bail!("not connected to a D-Bus session bus")
    }
}
