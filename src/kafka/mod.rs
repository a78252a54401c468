pub mod producer;

#[cfg(test)]
mod tests;

pub use producer::KafkaProducer;
