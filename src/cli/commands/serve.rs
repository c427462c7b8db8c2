//! Serve Command
//!
//! Runs the HTTP proxy in front of the backend until Ctrl-C.

use tokio::runtime::Runtime;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::server;
use crate::types::Result;

pub fn run(ctx: CommandContext, bind: Option<String>, out: &Output) -> Result<()> {
    let mut config = ctx.config;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }

    out.info(&format!(
        "Proxying {} on http://{}",
        config.backend.base(),
        config.server.bind
    ));
    let rt = Runtime::new()?;
    rt.block_on(server::serve(&config))
}
