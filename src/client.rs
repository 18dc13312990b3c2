use rackwire_engine::message::{Action, Message};
use tokio::sync::mpsc::{Receiver, Sender, channel};
use tracing::debug;

/// Request/response wrapper around the engine channel.
pub struct Client {
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl Client {
    pub async fn subscribe(tx: Sender<Message>) -> Result<Self, String> {
        let (client_tx, rx) = channel::<Message>(32);
        tx.send(Message::Channel(client_tx))
            .await
            .map_err(|e| e.to_string())?;
        Ok(Self { tx, rx })
    }

    pub async fn request(&mut self, action: Action) -> Result<Action, String> {
        debug!("sending {action:?}");
        self.tx
            .send(Message::Request(action))
            .await
            .map_err(|e| e.to_string())?;
        loop {
            match self.rx.recv().await {
                Some(Message::Response(result)) => return result,
                Some(_) => {}
                None => return Err("engine stopped".to_string()),
            }
        }
    }

    pub async fn quit(mut self) -> Result<(), String> {
        self.request(Action::Quit).await.map(|_| ())
    }
}
