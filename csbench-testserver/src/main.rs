use std::net::SocketAddr;

use csbench_testserver::{CloudHandle, TestServerOptions, TestServerStats};
use tokio::net::TcpListener;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut bind_addr: SocketAddr = "127.0.0.1:0".parse()?;
    let mut options = TestServerOptions::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => {
                let addr = args.next().ok_or_else(|| {
                    anyhow::anyhow!("--bind requires an address, e.g. 127.0.0.1:0")
                })?;
                bind_addr = addr.parse()?;
            }
            "--credentials" => {
                let pair = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--credentials requires APIKEY:SECRET"))?;
                let (key, secret) = pair.split_once(':').ok_or_else(|| {
                    anyhow::anyhow!("--credentials expects APIKEY:SECRET, got {pair}")
                })?;
                options = options.with_credentials(key, secret);
            }
            "--fail" => {
                let command = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--fail requires a command name"))?;
                options = options.with_failing_command(&command);
            }
            "-h" | "--help" => {
                eprintln!(
                    "csbench-testserver\n\nUSAGE:\n  csbench-testserver [--bind 127.0.0.1:0] [--credentials APIKEY:SECRET]... [--fail COMMAND]...\n\nOUTPUT:\n  Prints API_URL=<url> to stdout once ready."
                );
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown argument: {other}"));
            }
        }
    }

    let listener = TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    let app =
        csbench_testserver::router(options, TestServerStats::default(), CloudHandle::default());

    println!("API_URL=http://{addr}{}", csbench_testserver::PATH_API);

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
    });

    serve.await?;
    Ok(())
}
