/// Connection-string construction and authentication selection. The
/// engine only ever sees the finished opaque string.

/// How to authenticate against a given host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// Azure SQL endpoints authenticate through Azure AD.
    AzureAd,
    /// Everything else uses integrated security.
    Integrated,
}

pub fn auth_for_host(host: &str) -> AuthMethod {
    if host
        .to_lowercase()
        .ends_with(".database.windows.net")
    {
        AuthMethod::AzureAd
    } else {
        AuthMethod::Integrated
    }
}

/// Builds an ADO-style connection string from host and database. A
/// host without an explicit port gets the default 1433.
pub fn build_conn_string(host: &str, database: &str) -> String {
    let server = if host.contains(',') {
        format!("tcp:{host}")
    } else {
        format!("tcp:{host},1433")
    };
    let auth = match auth_for_host(host) {
        AuthMethod::AzureAd => "Authentication=ActiveDirectoryDefault",
        AuthMethod::Integrated => "IntegratedSecurity=true",
    };
    format!("Server={server};Database={database};TrustServerCertificate=true;{auth}")
}
