mod example;
mod roundtrip;
