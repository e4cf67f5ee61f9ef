mod announce;
mod codec;
mod command;
mod config;
mod consts;
mod daemon_client;
mod interceptor;
mod logging;
mod pidfile;
mod secret;
mod session;
mod state;
mod stats;
mod status;
mod supervisor;
mod test_hooks;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    let args = config::Args::parse();
    let config = config::load(args)?;

    logging::init(&config)?;

    #[cfg(feature = "test_hooks")]
    if let Ok(sock_path) = std::env::var("CACHEGATE_TEST_HOOK_SOCKET_PATH") {
        test_hooks::TEST_HOOK_SERVER.set_socket_path(sock_path);
        std::thread::spawn(|| test_hooks::TEST_HOOK_SERVER.start());
    }

    supervisor::run(config)
}
