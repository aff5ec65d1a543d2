//! Broker connection bootstrap. A thin wrapper over `lapin::Connection` that
//! owns the AMQP connection and hands out channels; the naming/envelope/
//! topology/publisher/consumer modules never touch a raw connection
//! themselves.

pub mod rabbitmq;

pub use rabbitmq::RabbitMqConnection;
