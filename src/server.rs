//! Listener lifecycle: bind all, serve concurrently, close together.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::api::{create_router, AppState, ListenerRole};
use crate::config::Config;
use crate::error::{BindError, ServiceError};

/// A listener socket that is bound but not yet serving.
#[derive(Debug)]
pub struct BoundListener {
    /// Which listener this is.
    pub role: ListenerRole,
    /// Address the socket actually bound to.
    pub local_addr: SocketAddr,
    listener: TcpListener,
}

/// Outcome of shutting the listeners down.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Listeners that drained and closed cleanly.
    pub closed: Vec<ListenerRole>,
    /// Listeners that stopped with an error.
    pub failed: Vec<(ListenerRole, String)>,
    /// Listeners aborted after the drain timeout.
    pub timed_out: Vec<ListenerRole>,
}

impl ShutdownReport {
    /// True when every listener closed cleanly.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.timed_out.is_empty()
    }
}

/// Bind one listener.
pub async fn bind(role: ListenerRole, addr: SocketAddr) -> Result<BoundListener, BindError> {
    let to_bind_error = |source| BindError { role, addr, source };
    let listener = TcpListener::bind(addr).await.map_err(to_bind_error)?;
    let local_addr = listener.local_addr().map_err(to_bind_error)?;
    info!("Server running on port {} ({})", local_addr.port(), role);
    Ok(BoundListener {
        role,
        local_addr,
        listener,
    })
}

/// Bind every listener in `addrs`. The first failure drops (closes) the
/// sockets bound so far and is returned.
pub async fn bind_addrs(addrs: &[(ListenerRole, SocketAddr)]) -> Result<Vec<BoundListener>, BindError> {
    let mut bound = Vec::with_capacity(addrs.len());
    for &(role, addr) in addrs {
        bound.push(bind(role, addr).await?);
    }
    Ok(bound)
}

/// Bind all three listeners on their configured addresses.
pub async fn bind_all(config: &Config) -> Result<Vec<BoundListener>, ServiceError> {
    let addrs = ListenerRole::ALL
        .into_iter()
        .map(|role| config.addr_for(role).map(|addr| (role, addr)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(ServiceError::InvalidConfig)?;
    Ok(bind_addrs(&addrs).await?)
}

/// Maps listener tasks back to their roles while they are joined.
#[derive(Debug, Default)]
struct ListenerTracker {
    pending: Vec<(Id, ListenerRole)>,
    report: ShutdownReport,
}

impl ListenerTracker {
    fn track(&mut self, id: Id, role: ListenerRole) {
        self.pending.push((id, role));
    }

    fn take(&mut self, id: Id) -> Option<ListenerRole> {
        let index = self.pending.iter().position(|(task, _)| *task == id)?;
        Some(self.pending.remove(index).1)
    }

    fn record(&mut self, joined: Result<(Id, std::io::Result<()>), JoinError>) {
        let (id, outcome) = match joined {
            Ok((id, result)) => (id, result.map_err(|e| e.to_string())),
            Err(e) => {
                let reason = if e.is_panic() {
                    "listener task panicked".to_string()
                } else {
                    e.to_string()
                };
                (e.id(), Err(reason))
            }
        };
        let Some(role) = self.take(id) else {
            warn!("joined an untracked listener task");
            return;
        };
        match outcome {
            Ok(()) => {
                info!("{} listener closed", role);
                self.report.closed.push(role);
            }
            Err(reason) => {
                error!("{} listener stopped: {}", role, reason);
                self.report.failed.push((role, reason));
            }
        }
    }

    /// Everything still pending is reported as timed out.
    fn finish(mut self) -> ShutdownReport {
        self.report.timed_out = self.pending.into_iter().map(|(_, role)| role).collect();
        self.report
    }
}

/// Serve every bound listener until `token` is cancelled, then drain.
///
/// Each listener runs in its own task; one stopping does not stop the
/// others. After cancellation the listeners get `drain_timeout` to finish
/// in-flight requests before the remaining tasks are aborted.
pub async fn serve<F>(
    listeners: Vec<BoundListener>,
    mut make_state: F,
    token: CancellationToken,
    drain_timeout: Duration,
) -> ShutdownReport
where
    F: FnMut(ListenerRole) -> AppState,
{
    let mut tracker = ListenerTracker::default();
    let mut tasks = JoinSet::new();

    for BoundListener { role, listener, .. } in listeners {
        let router = create_router(make_state(role));
        let token = token.clone();
        let handle = tasks.spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
        });
        tracker.track(handle.id(), role);
    }

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            joined = tasks.join_next_with_id() => match joined {
                Some(joined) => {
                    warn!("listener exited before shutdown");
                    tracker.record(joined);
                }
                None => break,
            },
        }
    }

    let drained = tokio::time::timeout(drain_timeout, async {
        while let Some(joined) = tasks.join_next_with_id().await {
            tracker.record(joined);
        }
    })
    .await;

    if drained.is_err() {
        warn!(
            "drain timeout of {:?} elapsed; aborting {} listener(s)",
            drain_timeout,
            tasks.len()
        );
        tasks.abort_all();
    }
    tracker.finish()
}

/// Bind all listeners from `config` and serve them until `token` is cancelled.
///
/// A cancellation that arrives while binding closes whatever is already
/// bound and returns an empty report.
pub async fn run<F>(config: &Config, make_state: F, token: CancellationToken) -> Result<ShutdownReport, ServiceError>
where
    F: FnMut(ListenerRole) -> AppState,
{
    let listeners = tokio::select! {
        biased;
        _ = token.cancelled() => {
            info!("shutdown requested during startup");
            return Ok(ShutdownReport::default());
        }
        bound = bind_all(config) => bound?,
    };

    Ok(serve(listeners, make_state, token, config.shutdown_timeout()).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn loopback() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
    }

    #[tokio::test]
    async fn bind_reports_role_and_addr_on_conflict() {
        let taken = bind(ListenerRole::Gateway, loopback()).await.unwrap();

        let err = bind_addrs(&[
            (ListenerRole::Metrics, loopback()),
            (ListenerRole::Admin, taken.local_addr),
        ])
        .await
        .unwrap_err();

        assert_eq!(err.role, ListenerRole::Admin);
        assert_eq!(err.addr, taken.local_addr);
        assert!(err.to_string().contains("admin"));
    }

    #[tokio::test]
    async fn serve_closes_all_on_cancel() {
        let listeners = bind_addrs(&[
            (ListenerRole::Gateway, loopback()),
            (ListenerRole::Metrics, loopback()),
            (ListenerRole::Admin, loopback()),
        ])
        .await
        .unwrap();
        let addrs: Vec<_> = listeners.iter().map(|l| l.local_addr).collect();

        let token = CancellationToken::new();
        let server = tokio::spawn(serve(
            listeners,
            AppState::new,
            token.clone(),
            Duration::from_secs(5),
        ));

        token.cancel();
        let report = tokio::time::timeout(Duration::from_secs(10), server)
            .await
            .unwrap()
            .unwrap();

        assert!(report.is_clean(), "{report:?}");
        assert_eq!(report.closed.len(), 3);
        for addr in addrs {
            assert!(tokio::net::TcpStream::connect(addr).await.is_err());
        }
    }

    #[tokio::test]
    async fn run_returns_empty_report_when_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let config = Config {
            bind_host: "127.0.0.1".to_string(),
            gateway_port: 0,
            metrics_port: 0,
            admin_port: 0,
            ..Config::default()
        };
        let report = run(&config, AppState::new, token).await.unwrap();
        assert!(report.is_clean());
        assert!(report.closed.is_empty());
    }

    #[tokio::test]
    async fn tracker_files_each_outcome_under_its_role() {
        let mut tasks: JoinSet<std::io::Result<()>> = JoinSet::new();
        let mut tracker = ListenerTracker::default();

        let closed = tasks.spawn(async { Ok(()) });
        tracker.track(closed.id(), ListenerRole::Gateway);
        let errored = tasks.spawn(async { Err(std::io::Error::other("accept failed")) });
        tracker.track(errored.id(), ListenerRole::Metrics);
        let panicked = tasks.spawn(async {
            if true {
                panic!("listener blew up");
            }
            Ok(())
        });
        tracker.track(panicked.id(), ListenerRole::Admin);

        while let Some(joined) = tasks.join_next_with_id().await {
            tracker.record(joined);
        }
        let mut report = tracker.finish();
        report.failed.sort_by_key(|(role, _)| role.as_str());

        assert_eq!(report.closed, vec![ListenerRole::Gateway]);
        assert!(report.timed_out.is_empty());
        assert_eq!(
            report.failed,
            vec![
                (ListenerRole::Admin, "listener task panicked".to_string()),
                (ListenerRole::Metrics, "accept failed".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn tracker_reports_unjoined_listeners_as_timed_out() {
        let mut tasks: JoinSet<std::io::Result<()>> = JoinSet::new();
        let mut tracker = ListenerTracker::default();
        let stuck = tasks.spawn(std::future::pending());
        tracker.track(stuck.id(), ListenerRole::Metrics);
        tasks.abort_all();

        let report = tracker.finish();
        assert_eq!(report.timed_out, vec![ListenerRole::Metrics]);
        assert!(!report.is_clean());
    }

    #[test]
    fn report_with_timeout_is_not_clean() {
        let report = ShutdownReport {
            timed_out: vec![ListenerRole::Admin],
            ..ShutdownReport::default()
        };
        assert!(!report.is_clean());
    }
}
