use crate::types::AccountCredentials;

pub const INTRODUCER_PORT: u16 = 12345;
pub const SERVER_PORT: u16 = 12346;

pub const NODE_USER: &str = "customer";
pub const INTRODUCER_DIR: &str = "/home/customer/introducer";
pub const SERVER_DIR: &str = "/home/customer/storageserver";

/// A file to place on the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFile {
    pub path: String,
    pub contents: String,
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug)]
pub struct IntroducerConfig<'a> {
    pub public_host: &'a str,
    pub private_host: &'a str,
}

#[derive(Debug)]
pub struct StorageServerConfig<'a> {
    pub public_host: &'a str,
    pub private_host: &'a str,
    pub introducer_furl: &'a str,
    pub bucket_name: &'a str,
    pub access_key_id: &'a str,
}

// ── Builders ─────────────────────────────────────────────────────────

fn location(public_host: &str, private_host: &str, port: u16) -> String {
    format!("{public_host}:{port},{private_host}:{port}")
}

/// Render `tahoe.cfg` for the introducer node.
pub fn render_introducer_config(config: &IntroducerConfig<'_>) -> String {
    format!(
        "[node]\n\
         nickname = introducer\n\
         web.port =\n\
         tub.port = {INTRODUCER_PORT}\n\
         tub.location = {}\n",
        location(config.public_host, config.private_host, INTRODUCER_PORT),
    )
}

/// Render `tahoe.cfg` for the storage server node, backed by the customer
/// bucket. Secrets are not part of the config; see [`storage_secret_files`].
pub fn render_storage_config(config: &StorageServerConfig<'_>) -> String {
    format!(
        "[node]\n\
         nickname = storageserver\n\
         web.port =\n\
         tub.port = {SERVER_PORT}\n\
         tub.location = {}\n\
         \n\
         [client]\n\
         introducer.furl = {}\n\
         \n\
         [storage]\n\
         enabled = true\n\
         backend = s3\n\
         s3.access_key_id = {}\n\
         s3.bucket = {}\n",
        location(config.public_host, config.private_host, SERVER_PORT),
        config.introducer_furl,
        config.access_key_id,
        config.bucket_name,
    )
}

/// Secret material the storage server reads from its `private/` directory.
pub fn storage_secret_files(credentials: &AccountCredentials) -> Vec<NodeFile> {
    let private = format!("{SERVER_DIR}/private");

    vec![
        NodeFile {
            path: format!("{private}/s3secret"),
            contents: format!("{}\n", credentials.secret_key),
        },
        NodeFile {
            path: format!("{private}/s3usertoken"),
            contents: format!("{}\n", credentials.user_token),
        },
        NodeFile {
            path: format!("{private}/s3producttoken"),
            contents: format!("{}\n", credentials.product_token),
        },
    ]
}
