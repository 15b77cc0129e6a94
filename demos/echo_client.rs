use frameflow::{connect_async, Incoming, MessageKind};
use rand::distr::Alphanumeric;
use rand::{thread_rng, Rng};
use tokio::net::TcpStream;
use tokio::select;
use tokio::time::{interval, Duration};

async fn handle_connection(addr: &str, url: &str) {
    let stream = match TcpStream::connect(addr).await {
        Ok(stream) => stream,
        Err(err) => {
            eprintln!("failed to connect to {addr}: {err}");
            return;
        }
    };

    let mut session = match connect_async(stream, url).await {
        Ok(session) => session,
        Err(err) => {
            eprintln!("handshake failed: {err}");
            return;
        }
    };

    let mut ticker = interval(Duration::from_secs(5));
    let mut received = 0;

    loop {
        select! {
            result = session.next_message() => {
                match result {
                    Ok(Incoming::Message(MessageKind::Text, payload)) => {
                        println!("received: {}", String::from_utf8_lossy(&payload));
                        received += 1;
                        if received >= 3 {
                            let _ = session.close(1000, "done".to_string()).await;
                            break;
                        }
                    }
                    Ok(Incoming::Message(MessageKind::Binary, payload)) => {
                        println!("received {} binary bytes", payload.len());
                    }
                    Ok(Incoming::Control(_)) => continue,
                    Err(err) => {
                        eprintln!("connection error: {err}");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                if session.send_text(random_string()).await.is_err() {
                    eprintln!("failed to send message");
                    break;
                }
            }
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    handle_connection("127.0.0.1:9002", "ws://127.0.0.1:9002").await;
}

fn random_string() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(30)
        .map(char::from)
        .collect()
}
