use rand::Rng;

pub mod dns;
pub mod bytes;
pub mod packet_utils;

pub fn generate_u16() -> u16 {
    rand::thread_rng().gen()
}
