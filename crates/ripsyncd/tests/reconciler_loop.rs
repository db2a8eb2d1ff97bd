//! End-to-end tests of the control loop
//!
//! The reconciler runs as it does in the daemon, fed through the bounded
//! queue, with a recording command runner in place of the route tool and
//! tokio's paused clock driving the expiry timer.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use ripsync_common::{CommandRunner, ExecResult, RipsyncResult};
use ripsyncd::{
    run_receiver, Advertisement, Platform, ReconcilerConfig, RejectFilter, RipEntry,
    RouteReconciler, UdpDatagramSource,
};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const CHECK: Duration = Duration::from_secs(180);
const QUIET: Duration = Duration::from_secs(300);

/// Records every invocation; deletes fail when asked to
#[derive(Clone, Default)]
struct RecordingRunner {
    calls: Arc<Mutex<Vec<String>>>,
    fail_deletes: bool,
}

impl RecordingRunner {
    fn failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, verb: &str) -> usize {
        self.calls()
            .iter()
            .filter(|line| line.split(' ').nth(2) == Some(verb))
            .count()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, program: &str, args: &[String]) -> RipsyncResult<ExecResult> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", program, args.join(" ")));

        let exit_code = if self.fail_deletes && args[1] == "del" { 2 } else { 0 };
        Ok(ExecResult {
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

fn adv(dest: [u8; 4], prefix_len: u8, metric: u32) -> Advertisement {
    RipEntry::new(Ipv4Addr::from(dest), prefix_len, metric)
        .advertised_by(Ipv4Addr::new(192, 168, 1, 1))
}

fn start(
    runner: RecordingRunner,
    filter: RejectFilter,
) -> (mpsc::Sender<Advertisement>, JoinHandle<RipsyncResult<()>>) {
    let config = ReconcilerConfig::new("eth0", Platform::Linux)
        .with_filter(filter)
        .with_timers(CHECK, QUIET);
    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(RouteReconciler::new(config, runner).run(rx));
    (tx, handle)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn duplicate_advertisements_install_once() {
    let runner = RecordingRunner::default();
    let (tx, handle) = start(runner.clone(), RejectFilter::default());

    tx.send(adv([10, 0, 0, 0], 24, 2)).await.unwrap();
    tx.send(adv([10, 0, 0, 0], 24, 2)).await.unwrap();
    tx.send(adv([10, 0, 0, 0], 24, 2)).await.unwrap();
    settle().await;

    assert_eq!(
        runner.calls(),
        vec!["/sbin/ip route add 10.0.0.0/24 via 192.168.1.1 dev eth0 proto rip metric 2"]
    );

    drop(tx);
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn quiet_network_withdraws_all_routes() {
    let runner = RecordingRunner::default();
    let (tx, handle) = start(runner.clone(), RejectFilter::default());

    tx.send(adv([10, 0, 0, 0], 24, 2)).await.unwrap();
    tx.send(adv([10, 0, 0, 0], 24, 4)).await.unwrap();
    tx.send(adv([10, 1, 0, 0], 16, 1)).await.unwrap();
    settle().await;
    assert_eq!(runner.count("add"), 3);

    // First check at 180s: still inside the quiet period
    tokio::time::sleep(CHECK).await;
    assert_eq!(runner.count("del"), 0);

    // Second check at 360s: quiet for longer than 300s
    tokio::time::sleep(CHECK).await;
    assert_eq!(runner.count("del"), 3);
    assert!(runner
        .calls()
        .contains(&"/sbin/ip route del 10.0.0.0/24 via 192.168.1.1 dev eth0 proto rip metric 4".to_string()));

    // Set is empty now: later checks issue nothing
    tokio::time::sleep(CHECK * 3).await;
    assert_eq!(runner.count("del"), 3);

    drop(tx);
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_deletes_still_clear_tracking() {
    let runner = RecordingRunner::failing_deletes();
    let (tx, handle) = start(runner.clone(), RejectFilter::default());

    tx.send(adv([10, 0, 0, 0], 24, 2)).await.unwrap();
    settle().await;

    tokio::time::sleep(CHECK * 2).await;
    assert_eq!(runner.count("del"), 1);

    // The route is no longer tracked, so it is installed again
    tx.send(adv([10, 0, 0, 0], 24, 2)).await.unwrap();
    settle().await;
    assert_eq!(runner.count("add"), 2);

    drop(tx);
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn new_installs_postpone_expiry() {
    let runner = RecordingRunner::default();
    let (tx, handle) = start(runner.clone(), RejectFilter::default());

    tx.send(adv([10, 0, 0, 0], 24, 2)).await.unwrap();
    settle().await;

    // A different route installed at ~200s refreshes the timestamp
    tokio::time::sleep(Duration::from_secs(200)).await;
    tx.send(adv([10, 2, 0, 0], 24, 2)).await.unwrap();
    settle().await;

    // Check at 360s: only ~160s since the last install
    tokio::time::sleep(Duration::from_secs(170)).await;
    assert_eq!(runner.count("del"), 0);

    // Check at 540s: ~340s quiet, everything goes
    tokio::time::sleep(CHECK).await;
    assert_eq!(runner.count("del"), 2);

    drop(tx);
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn rejected_routes_are_never_installed() {
    let runner = RecordingRunner::default();
    let filter = RejectFilter::parse("10.0.0.0/24;192.168.0.0/16").unwrap();
    let (tx, handle) = start(runner.clone(), filter);

    for _ in 0..5 {
        tx.send(adv([10, 0, 0, 0], 24, 2)).await.unwrap();
        tx.send(adv([192, 168, 0, 0], 16, 1)).await.unwrap();
    }
    tx.send(adv([10, 0, 0, 0], 25, 2)).await.unwrap();
    settle().await;

    assert_eq!(
        runner.calls(),
        vec!["/sbin/ip route add 10.0.0.0/25 via 192.168.1.1 dev eth0 proto rip metric 2"]
    );

    drop(tx);
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn datagrams_flow_from_socket_to_route_tool() {
    let runner = RecordingRunner::default();
    let (tx, handle) = start(runner.clone(), RejectFilter::default());

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let source = UdpDatagramSource::from(socket);
    let target = source.local_addr().unwrap();
    let receiver = tokio::spawn(run_receiver(source, tx));

    let mut pkt = vec![2, 2, 0, 0];
    pkt.extend_from_slice(&[0, 2, 0, 0, 172, 16, 4, 0, 255, 255, 252, 0, 0, 0, 0, 0, 0, 0, 0, 7]);
    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(&pkt, target).await.unwrap();

    let expected = "/sbin/ip route add 172.16.4.0/22 via 127.0.0.1 dev eth0 proto rip metric 7";
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while runner.calls().is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(runner.calls(), vec![expected]);

    receiver.abort();
    let _ = receiver.await;
    handle.await.unwrap().unwrap();
}
