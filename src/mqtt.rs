//! # MQTT client
//!
//! Uses the MQTT client of the module firmware over plain TCP. Only a single link (ID 0) is used.
//! Messages of subscribed topics arrive as `+MQTTSUBRECV` lines and may be captured with
//! [Adapter::wait_for_token].
use crate::commands::{MqttConnectCommand, MqttPublishCommand, MqttSubscribeCommand, MqttUserConfigCommand};
use crate::engine::TransactionError;
use crate::wifi::Adapter;
use embedded_io::Write;
use fugit_timer::Timer;
use log::info;

/// Delivery guarantee
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

/// Errors of the MQTT client commands
#[derive(Clone, Debug, PartialEq)]
pub enum MqttError {
    /// Setting client ID and credentials failed
    UserConfigError(TransactionError),

    /// Broker connection failed
    ConnectError(TransactionError),

    /// Subscribing to the topic failed
    SubscribeError(TransactionError),

    /// Publishing the message failed
    PublishError(TransactionError),
}

impl<W: Write, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize> Adapter<'_, W, T, TIMER_HZ, RX_SIZE> {
    /// Sets client ID and credentials. Needs to be called before [Adapter::mqtt_connect].
    pub fn mqtt_user_config(&mut self, client_id: &str, username: &str, password: &str) -> Result<(), MqttError> {
        self.send_command(MqttUserConfigCommand::new(client_id, username, password))?;
        Ok(())
    }

    /// Connects to the broker
    pub fn mqtt_connect(&mut self, host: &str, port: u16, reconnect: bool) -> Result<(), MqttError> {
        self.send_command(MqttConnectCommand::new(host, port, reconnect))?;
        info!("Connected to MQTT broker {}:{}", host, port);
        Ok(())
    }

    pub fn mqtt_subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), MqttError> {
        self.send_command(MqttSubscribeCommand::new(topic, qos))?;
        Ok(())
    }

    /// Publishes a string message
    pub fn mqtt_publish(&mut self, topic: &str, message: &str, qos: QoS, retain: bool) -> Result<(), MqttError> {
        self.send_command(MqttPublishCommand::new(topic, message, qos, retain))?;
        Ok(())
    }
}
