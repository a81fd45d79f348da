use clap::{Parser, Subcommand};
use nocket::{CloseCode, Config, Connection, Event, Message, upgrade};
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an echo server
    Serve {
        /// Address to bind
        #[arg(short, long, default_value = "127.0.0.1")]
        addr: String,

        /// Port to bind (0 picks a free one)
        #[arg(short, long, default_value_t = 9001)]
        port: u16,
    },
    /// Send one text message and print the reply
    Connect {
        /// Server host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Server port
        #[arg(short, long, default_value_t = 9001)]
        port: u16,

        /// Request path
        #[arg(long, default_value = "/")]
        path: String,

        /// Text to send
        #[arg(short, long, default_value = "hello")]
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), nocket::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nocket=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    match Args::parse().command {
        Command::Serve { addr, port } => serve(&addr, port).await,
        Command::Connect {
            host,
            port,
            path,
            message,
        } => connect(&host, port, &path, &message).await,
    }
}

async fn serve(addr: &str, port: u16) -> Result<(), nocket::Error> {
    let listener = TcpListener::bind((addr, port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        tokio::spawn(async move {
            match upgrade::accept(stream, Config::default()).await {
                Ok(conn) => echo(conn).await,
                Err(err) => tracing::warn!(%peer, error = %err, "upgrade failed"),
            }
        });
    }
}

async fn echo(mut conn: Connection<TcpStream>) {
    while let Some(event) = conn.next_event().await {
        let sent = match event {
            Event::Message(Message::Text(data)) => {
                println!("got message T {} {:?}", data.len(), String::from_utf8_lossy(&data));
                send_text_lossy(&mut conn, &data).await
            }
            Event::Message(Message::Binary(data)) => {
                println!("got message B {}", data.len());
                conn.send_binary(data).await
            }
            Event::Closed { code, reason } => {
                println!("client closed {code} {reason:?}");
                Ok(())
            }
            Event::TransportError(err) => {
                eprintln!("client error {err}");
                Ok(())
            }
            Event::Connected | Event::Pong(_) => Ok(()),
        };
        if let Err(err) = sent {
            tracing::debug!(error = %err, "echo not sent");
        }
    }
}

async fn send_text_lossy(conn: &mut Connection<TcpStream>, data: &[u8]) -> nocket::Result<()> {
    conn.send_text(&String::from_utf8_lossy(data)).await
}

async fn connect(host: &str, port: u16, path: &str, message: &str) -> Result<(), nocket::Error> {
    let stream = TcpStream::connect((host, port)).await?;
    let authority = format!("{host}:{port}");
    let mut conn = upgrade::connect(stream, &authority, path, Config::default()).await?;
    conn.send_text(message).await?;

    while let Some(event) = conn.next_event().await {
        match event {
            Event::Message(reply) => {
                match reply.as_text() {
                    Some(text) => println!("{text}"),
                    None => println!("{} bytes", reply.payload().len()),
                }
                conn.close(CloseCode::Normal, "done").await?;
            }
            Event::Closed { code, reason } => tracing::info!(code, %reason, "closed"),
            Event::TransportError(err) => return Err(err),
            Event::Connected | Event::Pong(_) => {}
        }
    }
    Ok(())
}
