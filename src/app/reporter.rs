//! Status reporter: the publishes the device makes on its own behalf.

use log::{debug, warn};

use crate::config::{Settings, TOPIC_RSSI, TOPIC_STATUS};
use crate::error::{CommsError, Result, TopicKind};

use super::ports::{LinkPort, MessagingPort};

fn publish(
    hw: &mut impl MessagingPort,
    topic: &str,
    payload: &str,
    retain: bool,
    kind: TopicKind,
) -> Result<()> {
    debug!("MQTT: {} {}", topic, payload);
    if hw.publish(topic, payload, retain) {
        Ok(())
    } else {
        warn!("MQTT: failed publishing {} on {}", kind, topic);
        Err(CommsError::PublishFailed(kind).into())
    }
}

/// Publish the signal strength, then `payload` on the status topic.  Both
/// retained.  Only the status publish decides the result.
pub fn publish_status(
    hw: &mut (impl MessagingPort + LinkPort),
    settings: &Settings,
    payload: &str,
) -> Result<()> {
    if !hw.is_connected() {
        warn!("MQTT: not connected to broker");
        return Err(CommsError::NotConnected.into());
    }

    let rssi = hw.rssi().to_string();
    let _ = publish(hw, &settings.topic(TOPIC_RSSI), &rssi, true, TopicKind::Rssi);

    publish(hw, &settings.topic(TOPIC_STATUS), payload, true, TopicKind::Status)
}

/// Answer an MQTT command on its reply topic.  Not retained.
pub fn publish_reply(hw: &mut impl MessagingPort, topic: &str, text: &str) -> Result<()> {
    publish(hw, topic, text, false, TopicKind::Reply)
}
