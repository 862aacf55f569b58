use std::thread::{self, JoinHandle};

use sqlock_common::prelude::*;

use crate::runtime::{InterruptSignal, Lock};

/// Unit of work that may only run in one process at a time.
///
/// `start` and `stop` are called on every monitor tick and must be idempotent.
pub trait Route: Send + Sync {
    fn id(&self) -> &str;

    fn start(&self) -> SqlockResult<()>;

    fn stop(&self) -> SqlockResult<()>;
}

/// Runs the registered routes only while this process holds the lock.
///
/// A monitor thread calls `try_lock` every `obtain_delay`: on success it starts the routes, which
/// also renews the lease, otherwise it stops them. With a finite lease, the expiration timeout has
/// to outlast `obtain_delay` plus the lock's retry budget or the lease lapses between ticks.
pub struct SerialAccessPolicy {
    shared: Arc<PolicyShared>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

struct PolicyShared {
    lock: Arc<dyn Lock>,
    /// Held for a whole monitor tick and by `on_remove`, so a removal never interleaves with a
    /// claim made for the previous route list.
    cycle: Mutex<()>,
    routes: Mutex<Vec<Arc<dyn Route>>>,
    routes_changed: Condvar,
    obtain_delay: Duration,
    running: AtomicBool,
    holding: AtomicBool,
    shutdown: InterruptSignal,
}

impl SerialAccessPolicy {
    pub const DEFAULT_OBTAIN_DELAY: Duration = Duration::from_millis(1000);

    /// Starts the lock monitor right away; it idles until a route is registered.
    pub fn new(lock: Arc<dyn Lock>, obtain_delay: Duration) -> SqlockResult<Self> {
        ensure_valid!(
            !obtain_delay.is_zero(),
            "Expected positive lock obtain delay."
        );
        let shared = Arc::new(PolicyShared {
            lock,
            cycle: Mutex::new(()),
            routes: Mutex::new(Vec::new()),
            routes_changed: Condvar::new(),
            obtain_delay,
            running: AtomicBool::new(true),
            holding: AtomicBool::new(false),
            shutdown: InterruptSignal::new(),
        });
        let monitor = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("serial-access-monitor".to_string())
                .spawn(move || shared.run())?
        };
        Ok(Self {
            shared,
            monitor: Mutex::new(Some(monitor)),
        })
    }

    pub fn obtain_delay(&self) -> Duration {
        self.shared.obtain_delay
    }

    /// Whether the last tick left this process holding the lock.
    pub fn is_holding(&self) -> bool {
        self.shared.holding.load(AtomicOrdering::SeqCst)
    }

    pub fn route_ids(&self) -> Vec<String> {
        self.shared
            .routes
            .lock()
            .iter()
            .map(|r| r.id().to_string())
            .collect()
    }

    /// Registers a route. It is not started here; the monitor starts it once the lock is held.
    pub fn on_init(&self, route: Arc<dyn Route>) {
        info!("route {} placed under serial access", route.id());
        self.shared.routes.lock().push(route);
        self.shared.routes_changed.notify_all();
    }

    /// Unregisters and stops a route. Removing the last one frees the lock for the other
    /// processes.
    pub fn on_remove(&self, route_id: &str) -> SqlockResult<()> {
        let _cycle = self.shared.cycle.lock();
        let (removed, now_empty) = {
            let mut routes = self.shared.routes.lock();
            let (removed, kept): (Vec<_>, Vec<_>) =
                routes.drain(..).partition(|r| r.id() == route_id);
            *routes = kept;
            (removed, routes.is_empty())
        };
        self.shared.stop_all(&removed);
        if now_empty && self.shared.lock.try_lock()? {
            self.shared.lock.unlock()?;
            self.shared.holding.store(false, AtomicOrdering::SeqCst);
        }
        Ok(())
    }

    /// Stops the monitor, stops every route and releases the lock if it was held.
    pub fn shutdown(&self) -> SqlockResult<()> {
        let monitor = match self.monitor.lock().take() {
            Some(monitor) => monitor,
            None => return Ok(()),
        };
        {
            let _routes = self.shared.routes.lock();
            self.shared.running.store(false, AtomicOrdering::SeqCst);
            self.shared.routes_changed.notify_all();
        }
        self.shared.shutdown.interrupt();
        if monitor.join().is_err() {
            error!("serial access monitor panicked");
        }

        let routes = self.shared.routes.lock().clone();
        self.shared.stop_all(&routes);
        if self.shared.holding.swap(false, AtomicOrdering::SeqCst) {
            self.shared.lock.unlock()?;
        }
        info!("serial access policy shut down");
        Ok(())
    }
}

impl Drop for SerialAccessPolicy {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("serial access policy shutdown failed: {}", e);
        }
    }
}

impl PolicyShared {
    fn run(&self) {
        while self.wait_for_routes() {
            {
                let _cycle = self.cycle.lock();
                // Read under the cycle lock: `on_remove` may have emptied the list meanwhile.
                let routes = self.routes.lock().clone();
                if routes.is_empty() {
                    continue;
                }
                if let Err(e) = self.tick(&routes) {
                    error!("serial access monitor tick failed: {}", e);
                    self.holding.store(false, AtomicOrdering::SeqCst);
                    self.stop_all(&routes);
                    if let Err(e) = self.lock.unlock() {
                        debug!("lock release after failed tick: {}", e);
                    }
                }
            }
            self.shutdown.sleep(self.obtain_delay);
        }
    }

    fn stop_all(&self, routes: &[Arc<dyn Route>]) {
        for route in routes {
            if let Err(e) = route.stop() {
                warn!("cannot stop route {}: {}", route.id(), e);
            }
        }
    }

    /// Parks while no route is registered. `false` once the policy is shut down.
    fn wait_for_routes(&self) -> bool {
        let mut routes = self.routes.lock();
        while routes.is_empty() && self.running.load(AtomicOrdering::SeqCst) {
            self.routes_changed.wait(&mut routes);
        }
        self.running.load(AtomicOrdering::SeqCst)
    }

    fn tick(&self, routes: &[Arc<dyn Route>]) -> SqlockResult<()> {
        if self.lock.try_lock()? {
            if !self.holding.swap(true, AtomicOrdering::SeqCst) {
                info!("lock obtained, starting {} route(s)", routes.len());
            }
            for route in routes {
                route.start()?;
            }
        } else {
            if self.holding.swap(false, AtomicOrdering::SeqCst) {
                info!("lock lost, stopping {} route(s)", routes.len());
            }
            for route in routes {
                route.stop()?;
            }
        }
        Ok(())
    }
}
