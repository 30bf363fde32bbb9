use uuid::Uuid;

/// Namespace for name-based thread ids. Changing this value changes every
/// derived channel id, so it is part of the wire contract.
const CHANNEL_NAMESPACE: Uuid = Uuid::from_u128(0x9f2c_64d1_7b3a_4e08_bd55_1a6f_c0d8_93e7);

/// Stable key for the conversation between two agents, independent of
/// argument order and letter case.
pub fn channel_key(a: &str, b: &str) -> String {
    let mut pair = [a.trim().to_lowercase(), b.trim().to_lowercase()];
    pair.sort();
    format!("dm:{}:{}", pair[0], pair[1])
}

/// Deterministic thread id for a pair of agents: UUIDv5 of the channel key
/// under a fixed namespace. Recomputable from the two agent ids alone.
pub fn thread_id(a: &str, b: &str) -> String {
    Uuid::new_v5(&CHANNEL_NAMESPACE, channel_key(a, b).as_bytes()).to_string()
}
