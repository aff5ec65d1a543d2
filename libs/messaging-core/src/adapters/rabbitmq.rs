use crate::error::CoreError;
use lapin::{Channel, Connection, ConnectionProperties};
use tracing::info;

/// Owns the AMQP connection; every consumer and the publisher get their own
/// channel off of it, mirroring `rabbitmq_event_bus.rs`'s single-connection,
/// many-channels shape.
pub struct RabbitMqConnection {
    connection: Connection,
}

impl RabbitMqConnection {
    pub async fn connect(amqp_addr: &str) -> Result<Self, CoreError> {
        let connection = Connection::connect(amqp_addr, ConnectionProperties::default()).await?;
        info!("connected to RabbitMQ");
        Ok(Self { connection })
    }

    pub async fn create_channel(&self) -> Result<Channel, CoreError> {
        Ok(self.connection.create_channel().await?)
    }

    pub async fn close(&self) -> Result<(), CoreError> {
        self.connection.close(0, "shutting down").await?;
        Ok(())
    }
}
