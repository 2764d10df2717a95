use crate::console::{is_game_over, is_quit, join_command, translate_input};
use log::{debug, info, warn};
use tokio::io::{stdin, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// A line-oriented connection to a Greedy Pirates server.
pub struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    server_addr: String,
}

impl Client {
    pub async fn connect(server_addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = TcpStream::connect(server_addr).await?;
        let (read_half, writer) = stream.into_split();

        info!("Connected to {}", server_addr);

        Ok(Client {
            lines: BufReader::new(read_half).lines(),
            writer,
            server_addr: server_addr.to_string(),
        })
    }

    pub fn server_addr(&self) -> &str {
        &self.server_addr
    }

    pub async fn send_line(&mut self, line: &str) -> std::io::Result<()> {
        debug!("-> {}", line);
        let mut data = line.as_bytes().to_vec();
        data.push(b'\n');
        self.writer.write_all(&data).await
    }

    /// Next line from the server, `None` once it has closed the connection.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.lines.next_line().await
    }

    /// Relays stdin to the server and prints everything the server sends
    /// until either side closes.
    pub async fn run(&mut self, name: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
        let mut input = BufReader::new(stdin()).lines();

        let name = match name {
            Some(name) => name,
            None => {
                println!("Enter your name:");
                match input.next_line().await? {
                    Some(name) => name,
                    None => return Ok(()),
                }
            }
        };
        self.send_line(&join_command(&name)).await?;

        let mut input_open = true;

        loop {
            tokio::select! {
                line = self.lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            println!("{}", line);
                            if is_game_over(&line) {
                                println!("Type `quit` to leave.");
                            }
                        }
                        Ok(None) => {
                            info!("Server closed the connection");
                            break;
                        }
                        Err(e) => {
                            warn!("Error reading from server: {}", e);
                            break;
                        }
                    }
                },

                typed = input.next_line(), if input_open => {
                    match typed? {
                        Some(typed) => {
                            if let Some(command) = translate_input(&typed) {
                                self.send_line(&command).await?;
                                if is_quit(&command) {
                                    input_open = false;
                                }
                            }
                        }
                        None => {
                            // stdin closed, leave politely and wait for the server to hang up
                            self.send_line("quit").await?;
                            input_open = false;
                        }
                    }
                },
            }
        }

        Ok(())
    }
}
