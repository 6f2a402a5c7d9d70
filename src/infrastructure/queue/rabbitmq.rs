use anyhow::{Result, anyhow, bail};
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer, options::*,
    publisher_confirm::Confirmation, types::FieldTable,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const PERSISTENT: u8 = 2;

/// Job intake and outcome hand-off over RabbitMQ. Publishing uses
/// publisher confirms and reconnects once on failure.
#[derive(Clone)]
pub struct RabbitMqService {
    url: String,
    link: Arc<Mutex<Link>>,
}

struct Link {
    // keeps the channel's connection open
    _conn: Connection,
    channel: Channel,
}

impl Link {
    async fn open(url: &str) -> Result<Self> {
        let conn = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;
        let channel = conn
            .create_channel()
            .await
            .map_err(|e| anyhow!("Failed to create channel: {}", e))?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to enable publisher confirms: {}", e))?;

        info!("✅ Connected to RabbitMQ");
        Ok(Self { _conn: conn, channel })
    }

    async fn declare(&self, queue: &str) -> Result<()> {
        let options = QueueDeclareOptions {
            durable: true,
            ..QueueDeclareOptions::default()
        };
        self.channel
            .queue_declare(queue, options, FieldTable::default())
            .await
            .map_err(|e| anyhow!("Failed to declare queue {}: {}", queue, e))?;
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<()> {
        self.declare(queue).await?;

        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(PERSISTENT);
        let confirmation = self
            .channel
            .basic_publish("", queue, BasicPublishOptions::default(), payload, properties)
            .await
            .map_err(|e| anyhow!("Failed to publish message: {}", e))?
            .await
            .map_err(|e| anyhow!("Failed to confirm publication: {}", e))?;

        if let Confirmation::Nack(_) = confirmation {
            bail!("Broker rejected message for {}", queue);
        }
        Ok(())
    }
}

impl RabbitMqService {
    pub async fn new(url: &str) -> Result<Self> {
        let link = Link::open(url).await?;
        Ok(Self {
            url: url.to_string(),
            link: Arc::new(Mutex::new(link)),
        })
    }

    pub async fn publish_json<T: Serialize>(&self, queue: &str, message: &T) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        let mut link = self.link.lock().await;

        if let Err(e) = link.publish(queue, &payload).await {
            warn!("RabbitMQ publish failed: {}. Retrying after reconnect.", e);
            *link = Link::open(&self.url).await?;
            link.publish(queue, &payload).await?;
        }
        debug!("Published {} bytes to {}", payload.len(), queue);
        Ok(())
    }

    /// Declares `queue` and consumes it with at most `prefetch`
    /// unacknowledged deliveries in flight.
    pub async fn consume(&self, queue: &str, consumer_tag: &str, prefetch: u16) -> Result<Consumer> {
        let link = self.link.lock().await;
        link.declare(queue).await?;

        link.channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to set prefetch: {}", e))?;

        link.channel
            .basic_consume(queue, consumer_tag, BasicConsumeOptions::default(), FieldTable::default())
            .await
            .map_err(|e| anyhow!("Failed to create consumer: {}", e))
    }
}
