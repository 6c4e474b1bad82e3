use liveroute_model::Route;
use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

/// Bounded FIFO of completed routes. Readers share the lock with each other
/// and only wait on an in-progress append.
#[derive(Debug)]
pub struct RouteHistory {
    capacity: usize,
    routes: RwLock<VecDeque<Route>>,
}

impl RouteHistory {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            routes: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn append(&self, route: Route) {
        let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
        while routes.len() >= self.capacity {
            routes.pop_front();
        }
        routes.push_back(route);
    }

    /// Routes oldest first.
    pub fn snapshot(&self) -> Vec<Route> {
        let routes = self.routes.read().unwrap_or_else(PoisonError::into_inner);
        routes.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
