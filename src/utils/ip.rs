//! 客户端 IP 提取与分类

use std::net::{IpAddr, SocketAddr};

/// IpAddressType 维度的取值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpKind {
    V4,
    V6,
    /// 无法解析的字符串，仍然原样落库
    Invalid,
}

impl IpKind {
    pub fn lookup_name(self) -> &'static str {
        match self {
            IpKind::V4 => "IPv4",
            IpKind::V6 => "IPv6",
            IpKind::Invalid => "Invalid",
        }
    }
}

/// 按标准地址语法分类
pub fn classify_ip(raw: &str) -> IpKind {
    match raw.parse::<IpAddr>() {
        Ok(IpAddr::V4(_)) => IpKind::V4,
        Ok(IpAddr::V6(_)) => IpKind::V6,
        Err(_) => IpKind::Invalid,
    }
}

/// X-Forwarded-For 的第一项（去除首尾空白），可能为空串
pub fn first_forwarded_for(header: &str) -> &str {
    header.split(',').next().unwrap_or_default().trim()
}

/// 客户端地址：X-Forwarded-For 非空时取第一项，否则取连接地址，都没有时为空串
///
/// 第一项为空或无法解析时原样保留，由 classify_ip 归入 Invalid。
pub fn client_ip(forwarded_for: Option<&str>, peer_addr: Option<&str>) -> String {
    forwarded_for
        .filter(|header| !header.is_empty())
        .map(first_forwarded_for)
        .or(peer_addr)
        .unwrap_or_default()
        .to_string()
}

/// 地址是否落在任一内部网段（单个 IP 或 CIDR）
pub fn is_internal_address(ip: &str, networks: &[String]) -> bool {
    if networks.is_empty() {
        return false;
    }

    // 兼容带端口的写法
    let ip_addr = if let Ok(socket_addr) = ip.parse::<SocketAddr>() {
        socket_addr.ip()
    } else if let Ok(ip_addr) = ip.parse::<IpAddr>() {
        ip_addr
    } else {
        return false;
    };

    networks.iter().any(|network| {
        if network.contains('/') {
            ip_in_cidr(&ip_addr, network)
        } else {
            network.parse::<IpAddr>().is_ok_and(|addr| addr == ip_addr)
        }
    })
}

/// CIDR 检查
pub fn ip_in_cidr(ip: &IpAddr, cidr: &str) -> bool {
    let Some((network, prefix_len)) = cidr.split_once('/') else {
        return false;
    };
    let Ok(prefix_len) = prefix_len.parse::<u32>() else {
        return false;
    };
    let Ok(network_addr) = network.parse::<IpAddr>() else {
        return false;
    };

    match (ip, network_addr) {
        (IpAddr::V4(ip), IpAddr::V4(net)) if prefix_len <= 32 => {
            let mask = u32::MAX.checked_shl(32 - prefix_len).unwrap_or(0);
            (u32::from(*ip) & mask) == (u32::from(net) & mask)
        }
        (IpAddr::V6(ip), IpAddr::V6(net)) if prefix_len <= 128 => {
            let mask = u128::MAX.checked_shl(128 - prefix_len).unwrap_or(0);
            (u128::from(*ip) & mask) == (u128::from(net) & mask)
        }
        _ => false,
    }
}
