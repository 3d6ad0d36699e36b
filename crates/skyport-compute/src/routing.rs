//! Load balancer, listeners and target groups.

use skyport_core::{ApplicationProtocol, LogicalId, SubnetSelection};
use skyport_template::{
    Declared, HealthCheck, IpAddressType, Listener, ListenerAction, LoadBalancer,
    ProtocolVersion, ProvisioningResult, ServiceTarget, TargetGroup, TargetType, Template,
};

/// Body served by the test listener until a controller rewires it.
pub const TEST_LISTENER_BODY: &str = "This is the load balancer default action";

const DEREGISTRATION_DELAY_SECS: u64 = 30;
const READINESS_PATH: &str = "/";
const HEALTHY_HTTP_CODES: &str = "200-299";
const HEALTHY_THRESHOLD: u32 = 3;
const UNHEALTHY_THRESHOLD: u32 = 5;
const HEALTH_INTERVAL_SECS: u64 = 30;
const HEALTH_TIMEOUT_SECS: u64 = 10;

/// Caller-owned load balancer options.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadBalancerProps {
    pub name: Option<String>,
    pub internet_facing: bool,
    pub ip_address_type: IpAddressType,
    pub http2_enabled: bool,
    pub idle_timeout_secs: Option<u32>,
    pub subnets: SubnetSelection,
}

impl Default for LoadBalancerProps {
    fn default() -> Self {
        Self {
            name: None,
            internet_facing: true,
            ip_address_type: IpAddressType::Ipv4,
            http2_enabled: true,
            idle_timeout_secs: None,
            subnets: SubnetSelection::Public,
        }
    }
}

/// Declare the load balancer inside the load-balancer security boundary.
pub fn declare_load_balancer(
    template: &mut Template,
    scope: &str,
    name: &str,
    props: &LoadBalancerProps,
    security_group: &LogicalId,
    subnets: Vec<LogicalId>,
) -> ProvisioningResult<Declared<LoadBalancer>> {
    template.declare(
        scope,
        &format!("{name}LoadBalancer"),
        LoadBalancer {
            load_balancer_name: props.name.clone(),
            internet_facing: props.internet_facing,
            ip_address_type: props.ip_address_type,
            http2_enabled: props.http2_enabled,
            idle_timeout_secs: props.idle_timeout_secs,
            security_groups: vec![security_group.clone()],
            subnets,
        },
    )
}

/// Declare a listener. `default_action` may be filled in later with
/// [`Template::amend`] once its target group exists.
pub fn declare_listener(
    template: &mut Template,
    scope: &str,
    id: &str,
    load_balancer: &LogicalId,
    (port, protocol): (u16, ApplicationProtocol),
    default_action: Option<ListenerAction>,
) -> ProvisioningResult<Declared<Listener>> {
    template.declare(
        scope,
        id,
        Listener {
            load_balancer: load_balancer.clone(),
            port,
            protocol,
            default_action,
        },
    )
}

/// Static 200 response used as the test listener's placeholder action.
pub fn placeholder_action() -> ListenerAction {
    ListenerAction::FixedResponse {
        status_code: 200,
        content_type: Some("text/plain".to_string()),
        message_body: Some(TEST_LISTENER_BODY.to_string()),
    }
}

/// Readiness policy applied to every target group.
pub fn readiness_check(container_port: u16) -> HealthCheck {
    HealthCheck {
        enabled: true,
        path: READINESS_PATH.to_string(),
        port: container_port.to_string(),
        protocol: ApplicationProtocol::Http,
        healthy_http_codes: HEALTHY_HTTP_CODES.to_string(),
        healthy_threshold: HEALTHY_THRESHOLD,
        unhealthy_threshold: UNHEALTHY_THRESHOLD,
        interval_secs: HEALTH_INTERVAL_SECS,
        timeout_secs: HEALTH_TIMEOUT_SECS,
    }
}

/// Declare an IP-addressed target group for `listener`.
pub fn declare_target_group(
    template: &mut Template,
    scope: &str,
    id: &str,
    network: &LogicalId,
    container_port: u16,
    listener: &LogicalId,
    targets: Vec<ServiceTarget>,
) -> ProvisioningResult<Declared<TargetGroup>> {
    template.declare(
        scope,
        id,
        TargetGroup {
            network: network.clone(),
            port: container_port,
            protocol: ApplicationProtocol::Http,
            protocol_version: ProtocolVersion::Http1,
            target_type: TargetType::Ip,
            deregistration_delay_secs: DEREGISTRATION_DELAY_SECS,
            health_check: readiness_check(container_port),
            listener: Some(listener.clone()),
            targets,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyport_template::{Network, SecurityGroup};

    fn setup() -> (Template, LogicalId, Declared<LoadBalancer>) {
        let mut template = Template::new("test");
        let net = template
            .declare(
                "vpc",
                "appVpc",
                Network {
                    cidr: "10.0.0.0/16".to_string(),
                    enable_dns_support: true,
                    enable_dns_hostnames: true,
                    max_azs: 2,
                },
            )
            .unwrap();
        let sg = template
            .declare(
                "compute",
                "lbSg",
                SecurityGroup {
                    description: "lb".to_string(),
                    network: net.logical_id.clone(),
                    allow_all_outbound: true,
                    ingress: Vec::new(),
                },
            )
            .unwrap();
        let lb = declare_load_balancer(
            &mut template,
            "compute",
            "web",
            &LoadBalancerProps::default(),
            &sg.logical_id,
            Vec::new(),
        )
        .unwrap();
        (template, net.logical_id, lb)
    }

    #[test]
    fn readiness_policy_is_fixed() {
        let check = readiness_check(8080);
        assert_eq!(check.path, "/");
        assert_eq!(check.port, "8080");
        assert_eq!(check.healthy_http_codes, "200-299");
        assert_eq!((check.healthy_threshold, check.unhealthy_threshold), (3, 5));
        assert_eq!((check.interval_secs, check.timeout_secs), (30, 10));
    }

    #[test]
    fn load_balancer_sits_in_given_boundary() {
        let (_, _, lb) = setup();
        assert_eq!(lb.properties.security_groups.len(), 1);
        assert!(lb.properties.internet_facing);
    }

    #[test]
    fn listener_then_target_group_then_forward() {
        let (mut template, net, lb) = setup();
        let listener = declare_listener(
            &mut template,
            "compute",
            "prod",
            &lb.logical_id,
            (80, ApplicationProtocol::Http),
            None,
        )
        .unwrap();
        let tg = declare_target_group(
            &mut template,
            "compute",
            "prodTg",
            &net,
            8080,
            &listener.logical_id,
            Vec::new(),
        )
        .unwrap();
        assert_eq!(tg.properties.deregistration_delay_secs, 30);
        assert_eq!(tg.properties.target_type, TargetType::Ip);

        let listener = template
            .amend::<Listener, _>(&listener.logical_id, |l| {
                l.default_action = Some(ListenerAction::Forward {
                    target_groups: vec![tg.logical_id.clone()],
                })
            })
            .unwrap();
        assert!(matches!(
            listener.properties.default_action,
            Some(ListenerAction::Forward { .. })
        ));
    }

    #[test]
    fn placeholder_serves_fixed_body() {
        match placeholder_action() {
            ListenerAction::FixedResponse {
                status_code,
                message_body,
                ..
            } => {
                assert_eq!(status_code, 200);
                assert_eq!(message_body.as_deref(), Some(TEST_LISTENER_BODY));
            }
            other => panic!("unexpected action {other:?}"),
        }
    }
}
