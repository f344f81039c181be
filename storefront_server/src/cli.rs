use std::{env, env::VarError};

const README: &str = r#"Storefront payment server

Confirms card payments for storefront orders. Payments are reported twice: once when the customer is redirected
back from the gateway (GET /api/payments/verify?reference=...), and once by the gateway's signed webhook
(POST /gateway/webhook). Whichever arrives first marks the order as paid, clears the customer's cart and sends the
confirmation email. The other is a no-op.

The server takes no command line arguments. It is configured entirely through environment variables, which may
also be placed in a .env file in the working directory. Secrets (SF_GATEWAY_SECRET_KEY, SF_GATEWAY_WEBHOOK_SECRET
and SF_MAIL_API_KEY) are not shown below."#;

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        println!("\n{README}\n");
        display_envs();
    }
    has_cli_args
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 14] = [
        "RUST_LOG",
        "SF_HOST",
        "SF_PORT",
        "SF_DATABASE_URL",
        "SF_GATEWAY_BASE_URL",
        "SF_GATEWAY_SIGNATURE_HEADER",
        "SF_GATEWAY_TIMEOUT_SECS",
        "SF_GATEWAY_IP_WHITELIST",
        "SF_USE_X_FORWARDED_FOR",
        "SF_USE_FORWARDED",
        "SF_PAID_ORDER_STATUS",
        "SF_MAIL_API_URL",
        "SF_MAIL_FROM",
        "SF_STORE_NAME",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
