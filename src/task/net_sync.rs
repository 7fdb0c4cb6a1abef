//! # Network sync task
//! This module contains the task that keeps the RTC and the alarm schedule in
//! sync with the outside world: it connects to a wifi network, sets the RTC
//! from a time API, and periodically fetches the alarm-definition list from
//! the remote store, handing each batch to the control loop.
//!
//! # populate constants SSID and PASSWORD
//! make sure to have a wifi_config.json file in the config folder formatted as follows:
//!```json
//!  {
//!     "ssid": "some_ssid_here",
//!     "password": "some_password_here"
//! }
//! ```
//!
//! # populate constants TIME_SERVER_URL and ALARM_SERVER_URL
//! make sure to have a sync_api.json file in the config folder formatted as follows:
//! ```json
//! {
//!     "time api by zone": {
//!         "baseurl": "http://worldtimeapi.org/api",
//!         "timezone": "/timezone/Europe/Berlin"
//!     },
//!     "alarm store": {
//!         "url": "https://example.com/alarms.json"
//!     }
//! }
//! ```
//! build.rs loads both files and writes them to wifi_secrets.rs and sync_api_config.rs

include!(concat!(env!("OUT_DIR"), "/wifi_secrets.rs"));
include!(concat!(env!("OUT_DIR"), "/sync_api_config.rs"));

use core::str::from_utf8;

use cyw43_pio::PioSpi;
use defmt::{error, info, unwrap, warn, Debug2Format};
use embassy_executor::Spawner;
use embassy_net::{
    dns,
    tcp::client::{TcpClient, TcpClientState},
    Config, DhcpConfig, Stack, StackResources,
};
use embassy_rp::clocks::RoscRng;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals;
use embassy_rp::peripherals::{DMA_CH0, PIO0};
use embassy_rp::pio::Pio;
use embassy_rp::rtc::{DateTime, DayOfWeek, Rtc};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{with_timeout, Duration, Instant, Timer};
use heapless::Vec;
use rand::RngCore;
use reqwless::client::{HttpClient, TlsConfig, TlsVerify};
use reqwless::request::Method;
use serde::Deserialize;
use static_cell::StaticCell;

use crate::task::control::{send_sync_batch, SyncBatch};
use crate::task::resources::{Irqs, RtcResources, WifiResources};

/// Type alias for the RTC mutex.
type RtcType = Mutex<CriticalSectionRawMutex, Option<Rtc<'static, peripherals::RTC>>>;
/// The RTC mutex, which is used to access the RTC from multiple tasks.
pub static RTC_MUTEX: RtcType = Mutex::new(None);

/// Connection parameters and refresh policy of the sync task.
struct NetSync {
    ssid: &'static str,
    password: &'static str,
    time_api_url: &'static str,
    alarm_store_url: &'static str,
    /// How often the alarm list is refetched.
    sync_after_secs: u64,
    /// How often the RTC is refreshed from the time API.
    time_refresh_after_secs: u64,
    retry_after_secs: u64,
    timeout_duration: Duration,
}

impl NetSync {
    fn new() -> Self {
        NetSync {
            ssid: SSID,
            password: PASSWORD,
            time_api_url: TIME_SERVER_URL,
            alarm_store_url: ALARM_SERVER_URL,
            sync_after_secs: 300,
            time_refresh_after_secs: 21_600, // 6 hours
            retry_after_secs: 30,
            timeout_duration: Duration::from_secs(10),
        }
    }
}

/// Parse an ISO datetime like `2024-06-26T22:01:27.106426+02:00` plus a
/// numeric day of week into an RTC DateTime, fractional seconds and timezone
/// suffix ignored. Unparseable parts come out as zero and the RTC rejects the
/// result.
fn parse_datetime(s: &str, d: u8) -> DateTime {
    const CAPACITY: usize = 10;

    let mut dt = DateTime {
        year: 0,
        month: 0,
        day: 0,
        day_of_week: match d {
            1 => DayOfWeek::Monday,
            2 => DayOfWeek::Tuesday,
            3 => DayOfWeek::Wednesday,
            4 => DayOfWeek::Thursday,
            5 => DayOfWeek::Friday,
            6 => DayOfWeek::Saturday,
            0 => DayOfWeek::Sunday, // as specified by worldtimeapi.org
            _ => DayOfWeek::Monday,
        },
        hour: 0,
        minute: 0,
        second: 0,
    };

    let parts: Vec<&str, CAPACITY> = s.split('T').collect();
    if parts.len() == 2 {
        let date_parts: Vec<&str, CAPACITY> = parts[0].split('-').collect();
        if date_parts.len() == 3 {
            dt.year = date_parts[0].parse::<u16>().unwrap_or_default();
            dt.month = date_parts[1].parse::<u8>().unwrap_or_default();
            dt.day = date_parts[2].parse::<u8>().unwrap_or_default();
        }

        let time_parts: Vec<&str, CAPACITY> = parts[1].split(':').collect();
        if time_parts.len() >= 3 {
            dt.hour = time_parts[0].parse::<u8>().unwrap_or_default();
            dt.minute = time_parts[1].parse::<u8>().unwrap_or_default();
            let second_parts: Vec<&str, CAPACITY> = time_parts[2].split('.').collect();
            dt.second = second_parts[0].parse::<u8>().unwrap_or_default();
        }
    }
    dt
}

#[embassy_executor::task]
async fn wifi_task(
    runner: cyw43::Runner<'static, Output<'static>, PioSpi<'static, PIO0, 0, DMA_CH0>>,
) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_task(stack: &'static Stack<cyw43::NetDriver<'static>>) -> ! {
    stack.run().await
}

#[embassy_executor::task]
pub async fn net_sync(spawner: Spawner, r: WifiResources, t: RtcResources) {
    info!("Net sync task started");

    info!("init rtc");
    // initialize the rtc and put it into a mutex
    {
        *(RTC_MUTEX.lock().await) = Some(Rtc::new(t.rtc_inst));
    }

    info!("init wifi");
    let pwr = Output::new(r.pwr_pin, Level::Low);
    let cs = Output::new(r.cs_pin, Level::High);
    let mut pio = Pio::new(r.pio_sm, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        pio.irq0,
        cs,
        r.dio_pin,
        r.clk_pin,
        r.dma_ch,
    );

    let net_sync = NetSync::new();

    let fw = unsafe { core::slice::from_raw_parts(0x10100000 as *const u8, 230321) };
    let clm = unsafe { core::slice::from_raw_parts(0x10140000 as *const u8, 4752) };

    static STATE: StaticCell<cyw43::State> = StaticCell::new();
    let state = STATE.init(cyw43::State::new());

    let (net_device, mut control, runner) = cyw43::new(state, pwr, spi, fw).await;

    unwrap!(spawner.spawn(wifi_task(runner)));

    info!("init control");
    control.init(clm).await;
    control
        .set_power_management(cyw43::PowerManagementMode::PowerSave)
        .await;

    let mut default_config: DhcpConfig = Default::default();
    default_config.hostname = Some("alarmclck".try_into().unwrap());
    let config = Config::dhcpv4(default_config);

    // random seed
    let mut rng = RoscRng;
    let seed = rng.next_u64();

    // Initialize the network stack
    static STACK: StaticCell<Stack<cyw43::NetDriver<'static>>> = StaticCell::new();
    static RESOURCES: StaticCell<StackResources<5>> = StaticCell::new();
    let stack = &*STACK.init(Stack::new(
        net_device,
        config,
        RESOURCES.init(StackResources::<5>::new()),
        seed,
    ));

    unwrap!(spawner.spawn(net_task(stack)));

    // when the RTC was last set from the time API; None forces a fetch
    let mut time_synced_at: Option<Instant> = None;

    info!("starting loop");
    '_mainloop: loop {
        info!(
            "Joining WPA2 network with SSID: {:?}",
            &net_sync.ssid
        );

        // Join the network
        let join_result = with_timeout(
            net_sync.timeout_duration,
            control.join_wpa2(net_sync.ssid, net_sync.password),
        )
        .await;
        match join_result {
            Ok(Ok(_)) => {
                control.gpio_set(0, true).await; // Turn on the onboard LED
                info!("Connected to wifi");
            }
            Ok(Err(e)) => {
                error!("Error connecting to wifi: {}", Debug2Format(&e));
                control.leave().await;
                control.gpio_set(0, false).await; // Turn off the onboard LED
                Timer::after(Duration::from_secs(net_sync.retry_after_secs)).await;
                continue;
            }
            Err(_) => {
                error!("Timeout while trying to connect to wifi");
                control.leave().await;
                control.gpio_set(0, false).await; // Turn off the onboard LED
                Timer::after(Duration::from_secs(net_sync.retry_after_secs)).await;
                continue;
            }
        }

        // dhcp
        let mut timeout_counter = 0;
        while !stack.is_config_up() {
            Timer::after_millis(100).await;
            timeout_counter += 1;
            if timeout_counter > 100 {
                break;
            }
        }
        if !stack.is_config_up() {
            control.leave().await;
            control.gpio_set(0, false).await; // Turn off the onboard LED
            error!(
                "Disconnected from wifi after waiting for DHCP timed out. Retrying in {:?} seconds",
                net_sync.retry_after_secs
            );
            Timer::after(Duration::from_secs(net_sync.retry_after_secs)).await;
            continue;
        }

        // link
        timeout_counter = 0;
        while !stack.is_link_up() {
            Timer::after_millis(500).await;
            timeout_counter += 1;
            if timeout_counter > 100 {
                break;
            }
        }
        if !stack.is_link_up() {
            control.leave().await;
            control.gpio_set(0, false).await; // Turn off the onboard LED
            error!(
                "Disconnected from wifi after establishing link timed out. Retrying in {:?} seconds",
                net_sync.retry_after_secs
            );
            Timer::after(Duration::from_secs(net_sync.retry_after_secs)).await;
            continue;
        }
        stack.wait_config_up().await;

        // create buffers for the requests and responses
        let mut rx_buffer = [0; 8192];
        let mut tls_read_buffer = [0; 16640];
        let mut tls_write_buffer = [0; 16640];

        let client_state = TcpClientState::<1, 1024, 1024>::new();
        let tcp_client = TcpClient::new(stack, &client_state);
        let dns_client = dns::DnsSocket::new(stack);
        let tls_config = TlsConfig::new(
            seed,
            &mut tls_read_buffer,
            &mut tls_write_buffer,
            TlsVerify::None,
        );

        let mut http_client = HttpClient::new_with_tls(&tcp_client, &dns_client, tls_config);

        // update the RTC from the time API, but not on every cycle
        let time_due = match time_synced_at {
            Some(at) => Instant::now().duration_since(at).as_secs() >= net_sync.time_refresh_after_secs,
            None => true,
        };
        '_time_fetch: {
            if !time_due {
                break '_time_fetch;
            }

            let mut request = match http_client.request(Method::GET, net_sync.time_api_url).await {
                Ok(req) => req,
                Err(e) => {
                    error!("Failed to make time API request: {:?}", Debug2Format(&e));
                    break '_time_fetch;
                }
            };

            let response = match request.send(&mut rx_buffer).await {
                Ok(resp) => resp,
                Err(e) => {
                    error!("Time API request failed: {:?}", Debug2Format(&e));
                    break '_time_fetch;
                }
            };

            let body = match response.body().read_to_end().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("Failed to read time API response: {:?}", Debug2Format(&e));
                    break '_time_fetch;
                }
            };

            // parse the response body and update the RTC
            #[derive(Deserialize)]
            struct ApiResponse<'a> {
                datetime: &'a str,
                day_of_week: u8,
            }

            let response: ApiResponse = match serde_json_core::de::from_slice::<ApiResponse>(body) {
                Ok((output, _used)) => output,
                Err(e) => {
                    error!("Failed to parse time API response: {:?}", Debug2Format(&e));
                    break '_time_fetch;
                }
            };
            info!("Datetime: {:?}", response.datetime);

            // set the RTC
            let dt = parse_datetime(response.datetime, response.day_of_week);
            let mut rtc_guard = RTC_MUTEX.lock().await;
            let Some(rtc) = rtc_guard.as_mut() else {
                break '_time_fetch;
            };
            match rtc.set_datetime(dt) {
                Ok(_) => {
                    info!("RTC updated from time API");
                    time_synced_at = Some(Instant::now());
                }
                Err(e) => {
                    error!("Failed to set datetime: {:?}", Debug2Format(&e));
                }
            }
        }

        // fetch the alarm definitions and hand them to the control loop
        '_alarm_fetch: {
            let mut request = match http_client.request(Method::GET, net_sync.alarm_store_url).await
            {
                Ok(req) => req,
                Err(e) => {
                    error!("Failed to make alarm store request: {:?}", Debug2Format(&e));
                    break '_alarm_fetch;
                }
            };

            let response = match request.send(&mut rx_buffer).await {
                Ok(resp) => resp,
                Err(e) => {
                    error!("Alarm store request failed: {:?}", Debug2Format(&e));
                    break '_alarm_fetch;
                }
            };

            let body = match response.body().read_to_end().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(
                        "Failed to read alarm store response: {:?}",
                        Debug2Format(&e)
                    );
                    break '_alarm_fetch;
                }
            };
            match from_utf8(&body[..]) {
                Ok(b) => info!("Alarm store response body: {:?}", b),
                Err(_) => warn!("Alarm store response is not valid utf-8"),
            }

            // per-record validation happens in the scheduling core; only a
            // structurally broken document is rejected wholesale here
            let batch: SyncBatch = match serde_json_core::de::from_slice::<SyncBatch>(body) {
                Ok((batch, _used)) => batch,
                Err(e) => {
                    error!(
                        "Failed to parse alarm store response: {:?}",
                        Debug2Format(&e)
                    );
                    break '_alarm_fetch;
                }
            };
            info!("Fetched {} alarm records", batch.len());
            send_sync_batch(batch).await;
        }

        control.leave().await;
        control.gpio_set(0, false).await; // Turn off the onboard LED
        info!("Disconnected from wifi");

        info!(
            "Waiting for {:?} seconds before the next sync",
            net_sync.sync_after_secs
        );
        Timer::after(Duration::from_secs(net_sync.sync_after_secs)).await;
    }
}
