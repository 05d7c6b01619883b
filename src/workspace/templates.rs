//! Static configuration files handed to the proxy.
//!
//! Rendering is a pure function of its parameters; writing to disk happens in
//! the workspace. The built-in main config is compiled in. An operator may
//! supply a replacement at runtime, rendered with the same parameters using
//! `{ field }` placeholders; literal braces are written `\{` and `\}`.

use askama::Template;
use serde::Serialize;
use tinytemplate::TinyTemplate;

use crate::error::TemplateError;

/// Parameters for the proxy's base configuration.
#[derive(Debug, Template, Serialize)]
#[template(
    ext = "txt",
    source = "
global
    master-worker
    stats socket {{ stats_socket }} mode 600 level admin expose-fd listeners
    stats timeout 2m
    tune.ssl.default-dh-param 1024
    nbthread {{ threads }}
    log-tag haproxy_sidecar

userlist {{ userlist }}
    user {{ admin_user }} insecure-password {{ admin_password }}
"
)]
pub struct MainConfig<'a> {
    pub stats_socket: &'a str,
    pub threads: usize,
    pub userlist: &'a str,
    pub admin_user: &'a str,
    pub admin_password: &'a str,
}

/// Render the proxy's base configuration, from `custom` when given.
pub fn render_main_config(
    params: &MainConfig<'_>,
    custom: Option<&str>,
) -> Result<String, TemplateError> {
    let Some(source) = custom else {
        return Ok(params.render()?);
    };

    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("main", source)?;
    Ok(tt.render("main", params)?)
}

/// Name of the policy-agent engine referenced by listener filters.
pub const POLICY_AGENT_ENGINE: &str = "intentions";

/// Backend the proxy uses to reach the policy agent.
pub const POLICY_AGENT_BACKEND: &str = "spoe_back";

/// Fixed policy-check protocol descriptor.
pub const POLICY_AGENT_CONFIG: &str = "
[intentions]

spoe-agent intentions-agent
    messages check-intentions

    option var-prefix connect

    timeout hello      3000ms
    timeout idle       3000s
    timeout processing 3000ms

    use-backend spoe_back

spoe-message check-intentions
    args ip=src cert=ssl_c_der
    event on-frontend-tcp-request
";
