//! Downstream (inbound) fragment: mesh callers → local application.

use crate::error::CertificateError;
use crate::state::certs::CertificateStore;
use crate::state::model::{Backend, Bind, Fragment, Frontend, Server};
use crate::state::routes::RouteSpec;
use crate::state::{
    app_name_rules, forward_for, intentions_filter, log_target, logging_enabled, BuildOptions,
    State,
};

pub const FRONTEND_NAME: &str = "front_downstream";
pub const BACKEND_NAME: &str = "back_downstream";
const SERVER_NAME: &str = "downstream_node";

/// Build the inbound listener/backend pair for `route` and append it to `state`.
///
/// TLS material is resolved first; on error `state` is left untouched.
pub fn build_downstream_fragment<C>(
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

    let mode = route.protocol.mode();
    let logging = logging_enabled(opts, route);
    let bind_name = format!("{FRONTEND_NAME}_bind");

    let bind = match tls {
        Some(paths) => Bind::mutual_tls(
            bind_name,
            route.local_bind_address.clone(),
            route.local_bind_port,
            paths.cert,
            paths.ca,
        ),
        None => Bind::plain(bind_name, route.local_bind_address.clone(), route.local_bind_port),
    };

    let frontend = Frontend {
        name: FRONTEND_NAME.to_string(),
        mode,
        default_backend: BACKEND_NAME.to_string(),
        client_timeout: opts.timeouts.client_ms,
        httplog: logging,
        bind,
        log_target: logging.then(|| log_target(opts)),
        filter: (opts.enable_intentions && route.enforce_intentions)
            .then(|| intentions_filter(opts)),
    };

    let backend = Backend {
        name: BACKEND_NAME.to_string(),
        mode,
        server_timeout: opts.timeouts.server_ms,
        connect_timeout: opts.timeouts.connect_ms,
        forwardfor: forward_for(route, mode),
        servers: vec![Server::plain(
            SERVER_NAME.to_string(),
            route.target_address.clone(),
            Some(route.target_port),
        )],
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
    use std::path::Path;
    use crate::state::certs::testing::{MissingCertStore, StaticCertStore};
    use crate::state::model::{Mode, RuleCond, TcpRequestAction, Verify};
    use crate::state::testing::{options, route};
    use crate::state::{Protocol, AUTHORIZED_COND, SOURCE_APP_FORMAT};

    #[test]
    fn http_route_builds_mutual_tls_listener() {
        let mut state = State::new();
        build_downstream_fragment(&options(), &StaticCertStore, &route("web", Protocol::Http), &mut state)
            .unwrap();

        assert_eq!(state.len(), 1);
        let Fragment { frontend, backend } = &state.fragments[0];
        assert_eq!(frontend.name, FRONTEND_NAME);
        assert_eq!(frontend.default_backend, BACKEND_NAME);
        assert_eq!(frontend.mode, Mode::Http);
        assert_eq!(backend.mode, Mode::Http);
        assert!(frontend.bind.ssl);
        assert_eq!(frontend.bind.verify, Some(Verify::Required));
        assert_eq!(frontend.bind.ssl_certificate.as_deref(), Some(Path::new("/certs/cert.pem")));
        assert_eq!(frontend.bind.ssl_cafile.as_deref(), Some(Path::new("/certs/ca.pem")));
        assert_eq!(frontend.bind.port, 21000);
        assert_eq!(backend.servers.len(), 1);
        assert_eq!(backend.servers[0].address, "127.0.0.1");
        assert_eq!(backend.servers[0].port, Some(8080));
        assert!(frontend.filter.is_none());
        assert!(frontend.log_target.is_none());
    }

    #[test]
    fn tcp_route_drops_http_features() {
        let mut r = route("db", Protocol::Tcp);
        r.enable_forward_for = true;
        r.app_name_header = Some("X-Connect-App".into());

        let mut state = State::new();
        build_downstream_fragment(&options(), &StaticCertStore, &r, &mut state).unwrap();

        let Fragment { frontend, backend } = &state.fragments[0];
        assert_eq!(frontend.mode, Mode::Tcp);
        assert_eq!(backend.mode, Mode::Tcp);
        assert!(!backend.forwardfor);
        assert!(backend.http_request_rules.is_empty());
    }

    #[test]
    fn http_route_injects_requested_headers() {
        let mut r = route("web", Protocol::Http);
        r.enable_forward_for = true;
        r.app_name_header = Some("X-Connect-App".into());

        let mut state = State::new();
        build_downstream_fragment(&options(), &StaticCertStore, &r, &mut state).unwrap();

        let backend = &state.fragments[0].backend;
        assert!(backend.forwardfor);
        assert_eq!(backend.http_request_rules.len(), 1);
        assert_eq!(backend.http_request_rules[0].hdr_name, "X-Connect-App");
        assert_eq!(backend.http_request_rules[0].hdr_format, SOURCE_APP_FORMAT);
    }

    #[test]
    fn certificate_failure_leaves_state_unchanged() {
        let mut state = State::new();
        build_downstream_fragment(&options(), &StaticCertStore, &route("a", Protocol::Http), &mut state)
            .unwrap();
        let before = state.clone();

        let err = build_downstream_fragment(
            &options(),
            &MissingCertStore,
            &route("b", Protocol::Http),
            &mut state,
        )
        .unwrap_err();
        assert!(matches!(err, CertificateError::MissingCertificate));
        assert_eq!(state.len(), 1);
        assert_eq!(state, before);
    }

    #[test]
    fn intentions_add_one_filter_and_negated_rule() {
        let mut opts = options();
        opts.enable_intentions = true;

        let mut state = State::new();
        build_downstream_fragment(&opts, &StaticCertStore, &route("web", Protocol::Http), &mut state)
            .unwrap();

        let filter = state.fragments[0].frontend.filter.as_ref().unwrap();
        assert_eq!(filter.filter.spoe_engine, "intentions");
        assert_eq!(filter.filter.spoe_config, opts.policy_agent_config);
        assert_eq!(filter.rule.action, TcpRequestAction::Reject);
        assert_eq!(filter.rule.cond, RuleCond::Unless);
        assert_eq!(filter.rule.cond_test, AUTHORIZED_COND);
    }

    #[test]
    fn route_can_opt_out_of_intentions() {
        let mut opts = options();
        opts.enable_intentions = true;
        let mut r = route("web", Protocol::Http);
        r.enforce_intentions = false;

        let mut state = State::new();
        build_downstream_fragment(&opts, &StaticCertStore, &r, &mut state).unwrap();
        assert!(state.fragments[0].frontend.filter.is_none());
    }

    #[test]
    fn logging_attaches_targets_to_both_sides() {
        let mut opts = options();
        opts.log_requests = true;

        let mut state = State::new();
        build_downstream_fragment(&opts, &StaticCertStore, &route("web", Protocol::Http), &mut state)
            .unwrap();

        let Fragment { frontend, backend } = &state.fragments[0];
        assert!(frontend.httplog);
        assert_eq!(frontend.log_target.as_ref().unwrap().address, "/ws/logs.sock");
        assert_eq!(frontend.log_target, backend.log_target);
    }

    #[test]
    fn timeouts_come_from_options() {
        let mut opts = options();
        opts.timeouts.client_ms = 1_000;
        opts.timeouts.server_ms = 2_000;
        opts.timeouts.connect_ms = 3_000;

        let mut state = State::new();
        build_downstream_fragment(&opts, &StaticCertStore, &route("web", Protocol::Http), &mut state)
            .unwrap();

        let Fragment { frontend, backend } = &state.fragments[0];
        assert_eq!(frontend.client_timeout, 1_000);
        assert_eq!(backend.server_timeout, 2_000);
        assert_eq!(backend.connect_timeout, 3_000);
    }

    #[test]
    fn plain_route_skips_certificate_resolution() {
        let mut r = route("web", Protocol::Http);
        r.tls_required = false;

        let mut state = State::new();
        build_downstream_fragment(&options(), &MissingCertStore, &r, &mut state).unwrap();
        assert!(!state.fragments[0].frontend.bind.ssl);
    }
}
