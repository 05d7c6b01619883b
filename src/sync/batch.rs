//! One synthesis pass over a route set.
//!
//! Every listener and backend in a batch must have a distinct name, and no
//! two listeners may share a port on overlapping addresses. A route that
//! would break either rule is skipped, the same as a route whose TLS
//! material cannot be resolved.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::error::CertificateError;
use crate::state::model::Bind;
use crate::state::{
    build_downstream_fragment, build_policy_agent_backend, build_stats_fragment,
    build_upstream_fragment, BuildOptions, CertificateStore, Fragment, State,
};
use crate::sync::routes_file::RouteSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Downstream,
    Upstream,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Downstream => "downstream",
            Direction::Upstream => "upstream",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a route was left out of a batch.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Certificate(#[from] CertificateError),

    /// The route's listener or backend name is already taken.
    #[error("proxy object {name} already exists")]
    DuplicateName { name: String },

    /// Another listener already binds this port on an overlapping address.
    #[error("{address}:{port} is already bound by another listener")]
    DuplicateBind { address: String, port: u16 },
}

/// A route left out of the batch.
#[derive(Debug)]
pub struct RouteFailure {
    pub route: String,
    pub direction: Direction,
    pub error: RouteError,
}

/// The built state plus every route that could not be included.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub state: State,
    pub failures: Vec<RouteFailure>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Names and listeners already taken in a batch.
#[derive(Debug, Default)]
struct Claims {
    names: HashSet<String>,
    binds: Vec<(String, u16)>,
}

impl Claims {
    /// Claims held by the parts of `state` that are not routes.
    fn reserved(state: &State) -> Self {
        let mut claims = Self::default();
        if let Some(backend) = &state.policy_agent {
            claims.names.insert(backend.name.clone());
        }
        if let Some(stats) = &state.stats {
            claims.claim(stats);
        }
        claims
    }

    fn check(&self, fragment: &Fragment) -> Result<(), RouteError> {
        for name in [&fragment.frontend.name, &fragment.backend.name] {
            if self.names.contains(name) {
                return Err(RouteError::DuplicateName { name: name.clone() });
            }
        }
        let bind = &fragment.frontend.bind;
        if self
            .binds
            .iter()
            .any(|(address, port)| *port == bind.port && overlaps(address, &bind.address))
        {
            return Err(RouteError::DuplicateBind {
                address: bind.address.clone(),
                port: bind.port,
            });
        }
        Ok(())
    }

    fn claim(&mut self, fragment: &Fragment) {
        self.names.insert(fragment.frontend.name.clone());
        self.names.insert(fragment.backend.name.clone());
        let Bind { address, port, .. } = &fragment.frontend.bind;
        self.binds.push((address.clone(), *port));
    }

    /// Keep the fragment just appended to `state` if it collides with nothing
    /// claimed so far; otherwise remove it.
    fn admit(&mut self, state: &mut State) -> Result<(), RouteError> {
        let Some(fragment) = state.fragments.last() else {
            return Ok(());
        };
        match self.check(fragment) {
            Ok(()) => {
                self.claim(fragment);
                Ok(())
            }
            Err(e) => {
                state.fragments.pop();
                Err(e)
            }
        }
    }
}

fn is_wildcard(address: &str) -> bool {
    matches!(address, "" | "*" | "0.0.0.0" | "::" | "[::]")
}

fn overlaps(a: &str, b: &str) -> bool {
    a == b || is_wildcard(a) || is_wildcard(b)
}

/// Build a fresh [`State`] from `routes`.
///
/// A route whose TLS material cannot be resolved, or whose names or listener
/// collide with an earlier route, is skipped; the others are still built.
pub fn build_state<C>(opts: &BuildOptions, certs: &C, routes: &RouteSet) -> BatchOutcome
where
    C: CertificateStore + ?Sized,
{
    let mut outcome = BatchOutcome::default();
    build_policy_agent_backend(opts, &mut outcome.state);
    build_stats_fragment(opts, &mut outcome.state);
    let mut claims = Claims::reserved(&outcome.state);

    if let Some(route) = &routes.downstream {
        let built = build_downstream_fragment(opts, certs, route, &mut outcome.state)
            .map_err(RouteError::from)
            .and_then(|()| claims.admit(&mut outcome.state));
        if let Err(error) = built {
            outcome.failures.push(RouteFailure {
                route: route.name.clone(),
                direction: Direction::Downstream,
                error,
            });
        }
    }

    for route in &routes.upstreams {
        let built = build_upstream_fragment(opts, certs, route, &mut outcome.state)
            .map_err(RouteError::from)
            .and_then(|()| claims.admit(&mut outcome.state));
        if let Err(error) = built {
            outcome.failures.push(RouteFailure {
                route: route.name.clone(),
                direction: Direction::Upstream,
                error,
            });
        }
    }

    outcome
}
