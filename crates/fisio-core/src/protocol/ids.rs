//! Flat sensor id table. Values are part of the wire contract and stay
//! stable across firmware variants.

macro_rules! sensor_ids {
    ($($(#[$meta:meta])* $name:ident = $value:literal,)*) => {
        /// Identifier carried in front of every sample on the wire.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum SensorId {
            $($(#[$meta])* $name = $value,)*
        }

        impl TryFrom<u8> for SensorId {
            type Error = u8;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$name),)*
                    other => Err(other),
                }
            }
        }
    };
}

sensor_ids! {
    // Environmental
    Temperature = 0x01,
    Humidity = 0x02,
    BarometricPressure = 0x03,

    // ECG raw channels
    EcgCh1 = 0x10,
    EcgCh2 = 0x11,
    EcgCh3 = 0x12,
    EcgCh4 = 0x13,
    /// Computed by the receiver, never emitted by this firmware.
    HeartRate = 0x14,
    /// Computed by the receiver, never emitted by this firmware.
    Spo2 = 0x15,
    /// 1.0 when the positive electrode is in contact.
    EcgLeadPlus = 0x16,
    /// 1.0 when the negative electrode is in contact.
    EcgLeadMinus = 0x17,

    // EMG channels
    EmgCh1 = 0x18,
    EmgCh2 = 0x19,
    EmgCh3 = 0x1A,
    EmgCh4 = 0x1B,

    // Generic ADC
    AdcCh0 = 0x20,
    AdcCh1 = 0x21,
    AdcCh2 = 0x22,
    AdcCh3 = 0x23,

    // Pressure / force
    AirPressure = 0x30,
    LoadCell = 0x31,
    Force = 0x32,
    /// Differential pressure, channel 1 (spirometry), kPa.
    Pressure1 = 0x33,
    /// Differential pressure, channel 2 (rhinomanometry), kPa.
    Pressure2 = 0x34,
    Flow1 = 0x35,
    Volume1 = 0x36,
    Flow2 = 0x37,
    Volume2 = 0x38,

    // EEG band power (TGAM)
    TgamQuality = 0x40,
    TgamAttention = 0x41,
    TgamMeditation = 0x42,
    TgamDelta = 0x43,
    TgamTheta = 0x44,
    TgamLowAlpha = 0x45,
    TgamHighAlpha = 0x46,
    TgamLowBeta = 0x47,
    TgamHighBeta = 0x48,
    TgamLowGamma = 0x49,
    TgamHighGamma = 0x4A,

    // EEG raw
    EegRawCh1 = 0x50,
    EegRawCh2 = 0x51,
    EegRawCh3 = 0x52,
    EegRawCh4 = 0x53,

    // IMU raw
    AccelX = 0x60,
    AccelY = 0x61,
    AccelZ = 0x62,
    GyroX = 0x63,
    GyroY = 0x64,
    GyroZ = 0x65,
    MagX = 0x66,
    MagY = 0x67,
    MagZ = 0x68,

    // IMU fused orientation
    Roll = 0x70,
    Pitch = 0x71,
    Yaw = 0x72,
    QuatW = 0x73,
    QuatX = 0x74,
    QuatY = 0x75,
    QuatZ = 0x76,
}

impl From<SensorId> for u8 {
    fn from(id: SensorId) -> Self {
        id as u8
    }
}
