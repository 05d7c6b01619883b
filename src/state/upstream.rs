//! Upstream (outbound) fragment: local application → remote mesh service.
//!
//! The listener is a plain local bind; mutual TLS is on the dialing side.
//! Intentions are enforced by the destination's sidecar, so no policy filter
//! is attached here.

use crate::error::CertificateError;
use crate::state::certs::CertificateStore;
use crate::state::model::{Backend, Bind, Fragment, Frontend, Server};
use crate::state::routes::RouteSpec;
use crate::state::{
    app_name_rules, forward_for, log_target, logging_enabled, object_name, BuildOptions, State,
};

/// Build the outbound listener/backend pair for `route` and append it to `state`.
///
/// TLS material is resolved first; on error `state` is left untouched.
pub fn build_upstream_fragment<C>(
    opts: &BuildOptions,
    certs: &C,
    route: &RouteSpec,
    state: &mut State,
) -> Result<(), CertificateError>
where
    C: CertificateStore + ?Sized,
{
    let tls = if route.tls_required {
        Some(certs.certs_path(&route.tls)?)
    } else {
        None
    };

    let name = object_name(&route.name);
    let fe_name = format!("front_{name}");
    let be_name = format!("back_{name}");
    let server_name = format!("{name}_node");

    let mode = route.protocol.mode();
    let logging = logging_enabled(opts, route);

    let server = match tls {
        Some(paths) => Server::mutual_tls(
            server_name,
            route.target_address.clone(),
            route.target_port,
            paths.cert,
            paths.ca,
        ),
        None => Server::plain(server_name, route.target_address.clone(), Some(route.target_port)),
    };

    let frontend = Frontend {
        bind: Bind::plain(
            format!("{fe_name}_bind"),
            route.local_bind_address.clone(),
            route.local_bind_port,
        ),
        name: fe_name,
        mode,
        default_backend: be_name.clone(),
        client_timeout: opts.timeouts.client_ms,
        httplog: logging,
        log_target: logging.then(|| log_target(opts)),
        filter: None,
    };

    let backend = Backend {
        name: be_name,
        mode,
        server_timeout: opts.timeouts.server_ms,
        connect_timeout: opts.timeouts.connect_ms,
        forwardfor: forward_for(route, mode),
        servers: vec![server],
        log_target: logging.then(|| log_target(opts)),
        http_request_rules: app_name_rules(route, mode),
        stats_options: None,
    };

    state.fragments.push(Fragment { frontend, backend });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::certs::testing::{MissingCertStore, StaticCertStore};
    use crate::state::model::{Mode, Verify};
    use crate::state::testing::{options, route};
    use crate::state::Protocol;

    #[test]
    fn upstream_dials_target_with_mutual_tls() {
        let mut state = State::new();
        build_upstream_fragment(&options(), &StaticCertStore, &route("billing", Protocol::Http), &mut state)
            .unwrap();

        let Fragment { frontend, backend } = &state.fragments[0];
        assert_eq!(frontend.name, "front_billing");
        assert_eq!(frontend.default_backend, "back_billing");
        assert!(!frontend.bind.ssl);
        assert!(frontend.filter.is_none());

        let server = &backend.servers[0];
        assert_eq!(server.name, "billing_node");
        assert!(server.ssl);
        assert_eq!(server.verify, Some(Verify::Required));
        assert_eq!(server.port, Some(8080));
    }

    #[test]
    fn upstream_modes_agree_and_tcp_drops_http_rules() {
        let mut r = route("cache", Protocol::Tcp);
        r.enable_forward_for = true;
        r.app_name_header = Some("X-App".into());

        let mut state = State::new();
        build_upstream_fragment(&options(), &StaticCertStore, &r, &mut state).unwrap();

        let Fragment { frontend, backend } = &state.fragments[0];
        assert_eq!(frontend.mode, Mode::Tcp);
        assert_eq!(backend.mode, Mode::Tcp);
        assert!(!backend.forwardfor);
        assert!(backend.http_request_rules.is_empty());
    }

    #[test]
    fn upstream_certificate_failure_appends_nothing() {
        let mut state = State::new();
        assert!(build_upstream_fragment(
            &options(),
            &MissingCertStore,
            &route("billing", Protocol::Http),
            &mut state
        )
        .is_err());
        assert!(state.is_empty());
    }

    #[test]
    fn upstream_names_are_sanitized() {
        let mut state = State::new();
        build_upstream_fragment(&options(), &StaticCertStore, &route("db primary", Protocol::Tcp), &mut state)
            .unwrap();
        assert_eq!(state.fragments[0].frontend.name, "front_db_primary");
    }
}
