use clap::Parser;
use request::PredictRequest;
use serde_json::{
    json,
    Value,
};
use specseek::errors::{
    Result,
    SpecSeekError,
};
use specseek::service::PredictionService;
use std::io::{
    BufReader,
    Read,
    Write,
};
use std::net::{
    TcpListener,
    TcpStream,
};
use std::sync::Arc;
use std::thread;
use tracing::level_filters::LevelFilter;
use tracing::{
    error,
    info,
};
use tracing_subscriber::EnvFilter;

mod cli;
mod request;

struct DaemonServer {
    service: Arc<PredictionService>,
    running: std::sync::atomic::AtomicBool,
}

impl DaemonServer {
    pub fn new(service: PredictionService) -> Self {
        Self {
            service: Arc::new(service),
            running: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn run(&self, addr: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr)?;
        info!("Listening on {}", addr);

        while self.running.load(std::sync::atomic::Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, _)) => {
                    let service = Arc::clone(&self.service);
                    match handle_connection(stream, service) {
                        Ok(_) => (),
                        Err(e) => error!("Error handling connection: {}", e),
                    };
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(std::time::Duration::from_millis(100));
                    continue;
                }
                Err(e) => error!("Error accepting connection: {}", e),
            }
        }

        Ok(())
    }
}

fn handle_connection(
    mut stream: TcpStream,
    service: Arc<PredictionService>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut buffer = String::new();

    loop {
        buffer.clear();
        reader.read_to_string(&mut buffer)?;

        if buffer.is_empty() {
            break;
        }

        let request: Value = match serde_json::from_str(&buffer) {
            Ok(q) => q,
            Err(e) => {
                let response = json!({
                    "status": "error",
                    "data": format!("Invalid JSON format: {}", e)
                });
                send_response(&mut stream, &response)?;
                continue;
            }
        };

        let request: PredictRequest = match serde_json::from_value(request) {
            Ok(q) => q,
            Err(e) => {
                let response = json!({
                    "status": "error",
                    "data": format!("Invalid request format: {}", e)
                });
                send_response(&mut stream, &response)?;
                continue;
            }
        };

        let start = std::time::Instant::now();
        let outcome = request.predict(&service);
        info!("Prediction took {:#?}", start.elapsed());
        let response = match outcome {
            Ok(prediction) => json!({
                "status": "success",
                "data": prediction
            }),
            Err(e) => json!({
                "status": "error",
                "data": format!("{}", e)
            }),
        };
        send_response(&mut stream, &response)?;
    }

    Ok(())
}

fn send_response(stream: &mut TcpStream, response: &Value) -> std::io::Result<()> {
    stream.write_all(response.to_string().as_bytes())?;
    stream.write_all(b"\n")?;
    Ok(())
}

fn main() -> Result<()> {
    // This uses the RUST_LOG environment variable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let conf = cli::Cli::parse();
    let service = PredictionService::from_dir(&conf.model_dir)?;
    info!(
        "Serving labels {:?} with extraction config {:?}",
        service.labels(),
        service.feature_config()
    );

    let sample = PredictRequest::sample();
    info!(
        "Sample request: \n{}",
        serde_json::to_string_pretty(&sample).unwrap_or_default()
    );

    // Run the full request path once before accepting connections, so a
    // broken bundle fails at startup instead of on the first client.
    let start = std::time::Instant::now();
    match sample.predict(&service) {
        Ok(response) => {
            info!(
                "Warm-up prediction OK ({}) in {:#?}",
                response.prediction,
                start.elapsed()
            );
        }
        Err(e) => {
            error!("Warm-up prediction failed: {}", e);
            return Err(e);
        }
    }

    let server = DaemonServer::new(service);
    match server.run(&conf.address) {
        Ok(_) => Ok(()),
        Err(e) => Err(SpecSeekError::Io {
            source: e,
            path: None,
        }),
    }
}
